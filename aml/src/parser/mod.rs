// aml/src/parser/mod.rs
//
// 役割:
// - バイトコードの読み取り基盤（cursor / PkgLength framing）をまとめる中継点。

pub mod cursor;
pub mod pkg_length;

pub use cursor::Cursor;
pub use pkg_length::{framed, PkgLength};
