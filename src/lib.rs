#![no_std]

extern crate alloc;

pub mod card;
pub mod command;
pub mod commands;
pub mod error;
pub mod host;
pub mod init;
pub mod io;
pub mod registers;
