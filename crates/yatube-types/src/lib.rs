//! Wire types shared by the Yatube API crate and its clients.

pub mod api;
