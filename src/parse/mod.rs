pub mod shell;
pub mod tokenize;

pub use shell::{
    extract_substitutions, has_output_redirection, split_commands, unwrap_shell_wrapper,
};
pub use tokenize::{base_command, match_text, skip_assignments, strip_assignment_prefix, words};
