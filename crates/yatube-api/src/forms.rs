//! Input forms. Each form validates a raw submission into a value the
//! handlers can write, or into field-level errors with nothing written.

use axum::extract::Multipart;
use tracing::debug;
use uuid::Uuid;
use validator::ValidateEmail;

use yatube_db::Database;
use yatube_db::models::PostFields;
use yatube_types::api::{CommentRequest, PasswordChangeRequest, SignupRequest};

use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, FormErrors};
use crate::media::UploadedImage;

/// Largest accepted post image.
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;

const REQUIRED: &str = "This field is required.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";

// -- Posts --

/// Raw multipart submission of the create/edit post form.
#[derive(Debug, Default)]
pub struct PostForm {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<UploadedImage>,
}

/// A post submission that passed validation. The image is not stored yet.
#[derive(Debug)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<UploadedImage>,
}

impl ValidPost {
    /// Row fields, with `image` being the stored path to reference.
    pub fn into_fields(self, image: Option<String>) -> PostFields {
        PostFields {
            text: self.text,
            group_id: self.group_id,
            image,
        }
    }
}

impl PostForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("text") => {
                    form.text = Some(field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?);
                }
                Some("group") => {
                    form.group = Some(field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?);
                }
                Some("image") => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
                    // Browsers send an empty part when no file was picked.
                    if !bytes.is_empty() {
                        form.image = Some(UploadedImage { filename, bytes });
                    }
                }
                other => debug!("Ignoring unexpected post form field {:?}", other),
            }
        }

        Ok(form)
    }

    pub fn validate(self, db: &Database) -> Result<ValidPost, ApiError> {
        let mut errors = FormErrors::default();

        let text = self.text.as_deref().map(str::trim).unwrap_or_default().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) if db.get_group_by_id(id)?.is_some() => Some(id),
                _ => {
                    errors.add(
                        "group",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                    None
                }
            },
        };

        if let Some(upload) = &self.image {
            if upload.bytes.len() > MAX_IMAGE_SIZE {
                errors.add("image", format!("Images may be at most {} MB.", MAX_IMAGE_SIZE / (1024 * 1024)));
            } else if let Err(e) = image::load_from_memory(&upload.bytes) {
                debug!("Rejected upload '{}': {:?}", upload.filename, e);
                errors.add(
                    "image",
                    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                );
            }
        }

        errors.finish(ValidPost {
            text,
            group_id,
            image: self.image,
        })
    }
}

// -- Comments --

pub struct CommentForm;

impl CommentForm {
    /// Trimmed comment text, or `None` when there is nothing to post.
    pub fn validate(req: &CommentRequest) -> Option<String> {
        let text = req.text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

// -- Accounts --

#[derive(Debug)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub const FIELDS: [&'static str; 6] =
        ["first_name", "last_name", "username", "email", "password1", "password2"];

    pub fn validate(req: SignupRequest, db: &Database) -> Result<Self, ApiError> {
        let mut errors = FormErrors::default();

        let username = req.username.trim().to_string();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if username.chars().count() > MAX_USERNAME_LEN {
            errors.add(
                "username",
                format!("Ensure this value has at most {} characters.", MAX_USERNAME_LEN),
            );
        } else if !username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        } else if db.get_user_by_username(&username)?.is_some() {
            errors.add("username", USERNAME_TAKEN);
        }

        let email = req.email.trim().to_string();
        if !email.is_empty() && !email.validate_email() {
            errors.add("email", "Enter a valid email address.");
        }

        check_new_password(&mut errors, "password1", "password2", &req.password1, &req.password2);

        errors.finish(Self {
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            username,
            email,
            password: req.password1,
        })
    }
}

impl SignupForm {
    /// Creates the account and returns its username. A username claimed
    /// since validation is reported as a field error.
    pub fn save(self, db: &Database) -> Result<String, ApiError> {
        let password_hash = hash_password(&self.password)?;
        let created = db.create_user(
            &Uuid::new_v4().to_string(),
            &self.username,
            &self.first_name,
            &self.last_name,
            &self.email,
            &password_hash,
        )?;

        if !created {
            let mut errors = FormErrors::default();
            errors.add("username", USERNAME_TAKEN);
            return errors.finish(self.username);
        }
        Ok(self.username)
    }
}

#[derive(Debug)]
pub struct PasswordChangeForm {
    pub new_password: String,
}

impl PasswordChangeForm {
    pub const FIELDS: [&'static str; 3] = ["old_password", "new_password1", "new_password2"];

    pub fn validate(req: PasswordChangeRequest, stored_hash: &str) -> Result<Self, ApiError> {
        let mut errors = FormErrors::default();

        if !verify_password(&req.old_password, stored_hash)? {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }

        check_new_password(
            &mut errors,
            "new_password1",
            "new_password2",
            &req.new_password1,
            &req.new_password2,
        );

        errors.finish(Self {
            new_password: req.new_password1,
        })
    }
}

fn check_new_password(
    errors: &mut FormErrors,
    first_field: &str,
    second_field: &str,
    first: &str,
    second: &str,
) {
    if first.is_empty() {
        errors.add(first_field, REQUIRED);
    }
    if second.is_empty() {
        errors.add(second_field, REQUIRED);
        return;
    }
    if first != second {
        errors.add(second_field, "The two password fields didn't match.");
        return;
    }
    if second.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            second_field,
            format!(
                "This password is too short. It must contain at least {} characters.",
                MIN_PASSWORD_LEN
            ),
        );
    }
    if second.chars().all(|c| c.is_ascii_digit()) {
        errors.add(second_field, "This password is entirely numeric.");
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    // 2x1 GIF
    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn post_form(text: &str, group: Option<&str>, image: Option<&'static [u8]>) -> PostForm {
        PostForm {
            text: Some(text.to_string()),
            group: group.map(str::to_string),
            image: image.map(|bytes| UploadedImage {
                filename: "small.gif".to_string(),
                bytes: Bytes::from_static(bytes),
            }),
        }
    }

    fn field_errors(err: ApiError) -> FormErrors {
        match err {
            ApiError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_post_is_trimmed_and_bound() {
        let db = Database::open_in_memory().unwrap();
        let group = db.create_group("Rust", "rust", "").unwrap();

        let valid = post_form("  hello  ", Some(&group.to_string()), Some(SMALL_GIF))
            .validate(&db)
            .unwrap();
        assert_eq!(valid.text, "hello");
        assert_eq!(valid.group_id, Some(group));
        assert!(valid.image.is_some());
    }

    #[test]
    fn blank_text_and_unknown_group_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        let errors = field_errors(post_form("   ", Some("42"), None).validate(&db).unwrap_err());
        assert_eq!(errors.get("text"), Some(&[REQUIRED.to_string()][..]));
        assert!(errors.get("group").is_some());
    }

    #[test]
    fn non_image_upload_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let errors = field_errors(
            post_form("text", None, Some(b"definitely not an image"))
                .validate(&db)
                .unwrap_err(),
        );
        assert!(errors.get("image").is_some());
        assert!(errors.get("text").is_none());
    }

    #[test]
    fn truncated_image_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let errors = field_errors(
            post_form("text", None, Some(&SMALL_GIF[..24]))
                .validate(&db)
                .unwrap_err(),
        );
        assert!(errors.get("image").is_some());
    }

    #[test]
    fn empty_group_means_no_group() {
        let db = Database::open_in_memory().unwrap();
        let valid = post_form("text", Some(""), None).validate(&db).unwrap();
        assert_eq!(valid.group_id, None);
    }

    #[test]
    fn comment_text_must_not_be_blank() {
        let blank = CommentRequest { text: " \n ".into() };
        let filled = CommentRequest { text: " nice post ".into() };
        assert_eq!(CommentForm::validate(&blank), None);
        assert_eq!(CommentForm::validate(&filled).as_deref(), Some("nice post"));
    }

    fn signup(username: &str, password1: &str, password2: &str) -> SignupRequest {
        SignupRequest {
            first_name: "Leo".into(),
            last_name: "Tolstoy".into(),
            username: username.into(),
            email: "leo@example.com".into(),
            password1: password1.into(),
            password2: password2.into(),
        }
    }

    #[test]
    fn signup_checks_username_and_passwords() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "taken", "", "", "", "hash").unwrap();

        let errors = field_errors(SignupForm::validate(signup("taken", "a", "b"), &db).unwrap_err());
        assert!(errors.get("username").is_some());
        assert_eq!(
            errors.get("password2"),
            Some(&["The two password fields didn't match.".to_string()][..])
        );

        let errors =
            field_errors(SignupForm::validate(signup("bad name!", "12345678", "12345678"), &db).unwrap_err());
        assert!(errors.get("username").is_some());
        assert_eq!(
            errors.get("password2"),
            Some(&["This password is entirely numeric.".to_string()][..])
        );

        let form = SignupForm::validate(signup("leo", "war-and-peace", "war-and-peace"), &db).unwrap();
        assert_eq!(form.username, "leo");
        assert_eq!(form.password, "war-and-peace");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        for email in ["a b@x.y", "leo@x..y", "@example.com", "leo"] {
            let mut req = signup("leo", "war-and-peace", "war-and-peace");
            req.email = email.into();
            let errors = field_errors(SignupForm::validate(req, &db).unwrap_err());
            assert_eq!(
                errors.get("email"),
                Some(&["Enter a valid email address.".to_string()][..]),
                "{email}"
            );
        }

        let mut req = signup("leo", "war-and-peace", "war-and-peace");
        req.email = String::new();
        assert!(SignupForm::validate(req, &db).is_ok());
    }

    #[test]
    fn username_claimed_after_validation_is_a_field_error() {
        let db = Database::open_in_memory().unwrap();
        let form = SignupForm::validate(signup("leo", "war-and-peace", "war-and-peace"), &db).unwrap();

        // Another signup takes the name between validation and insert.
        db.create_user("u1", "leo", "", "", "", "hash").unwrap();

        let errors = field_errors(form.save(&db).unwrap_err());
        assert_eq!(errors.get("username"), Some(&[USERNAME_TAKEN.to_string()][..]));
    }

    #[test]
    fn password_change_requires_old_password() {
        let stored = crate::auth::hash_password("old-secret").unwrap();
        let req = PasswordChangeRequest {
            old_password: "wrong".into(),
            new_password1: "new-secret-1".into(),
            new_password2: "new-secret-1".into(),
        };
        let errors = field_errors(PasswordChangeForm::validate(req, &stored).unwrap_err());
        assert!(errors.get("old_password").is_some());

        let req = PasswordChangeRequest {
            old_password: "old-secret".into(),
            new_password1: "new-secret-1".into(),
            new_password2: "new-secret-1".into(),
        };
        assert_eq!(PasswordChangeForm::validate(req, &stored).unwrap().new_password, "new-secret-1");
    }
}
