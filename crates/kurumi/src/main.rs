/// CLI module - command-line interface for kurumi
mod cli;

/// Editor module - editing note bodies in the user's editor
mod editor;

fn main() {
    cli::run_cli();
}
