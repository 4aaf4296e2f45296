//! Filesystem primitives behind the dispatcher.
//!
//! One function per operation, all taking already-validated paths:
//!
//! | operation | primitive |
//! |-----------|-----------|
//! | list | [`list_directory`] |
//! | mkdir | [`create_directory`] |
//! | rmtree | [`remove_tree`] |
//! | chmod | [`change_mode`] |
//! | symlink | [`create_symlink`] |
//! | copy | [`copy`] |
//! | move | [`move_path`] |
//! | append | [`append_or_create`] |
//! | view, audit | [`read_file`] |
//! | find | [`Find`] |

mod entry;
mod find;
mod primitives;

pub use entry::{DirEntry, DirEntryKind, mode_string};
pub use find::{Find, FindIter};
pub use primitives::{
    append_or_create, change_mode, copy, create_directory, create_symlink, list_directory, move_path,
    read_file, remove_tree, same_file,
};
