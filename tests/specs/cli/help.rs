//! Help and version specs

use crate::prelude::*;

#[test]
fn help_lists_every_command_group() {
    Cli::bare()
        .args(&["--help"])
        .passes()
        .stdout_has("init")
        .stdout_has("acquire")
        .stdout_has("release-all")
        .stdout_has("read")
        .stdout_has("write")
        .stdout_has("rw");
}

#[test]
fn version_names_the_binary() {
    Cli::bare().args(&["--version"]).passes().stdout_has("dbsem");
}

#[test]
fn write_help_lists_the_precursor_step() {
    Cli::bare()
        .args(&["write", "--help"])
        .passes()
        .stdout_has("precursor")
        .stdout_has("acquire");
}
