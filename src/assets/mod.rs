//! Input preparation: image decode, color parsing, font resolution.

pub(crate) mod color;
pub(crate) mod decode;
pub(crate) mod fonts;
