//! Coloured console output. Colours are dropped automatically when the
//! stream is not a terminal, which keeps the background log file plain.

use owo_colors::{OwoColorize, Stream};

pub fn label(text: &str) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.cyan())
        .to_string()
}

pub fn value(text: &str) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.bold().magenta().to_string())
        .to_string()
}

pub fn heading(text: &str) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.blue())
        .to_string()
}

pub fn success(message: &str) {
    println!("{}", message.if_supports_color(Stream::Stdout, |t| t.green()));
}

pub fn notice(message: &str) {
    println!("{}", message.if_supports_color(Stream::Stdout, |t| t.yellow()));
}

pub fn warn(message: &str) {
    eprintln!(
        "{} {message}",
        "warning:".if_supports_color(Stream::Stderr, |t| t.yellow().bold().to_string())
    );
}

pub fn error(message: &str) {
    eprintln!(
        "{} {message}",
        "error:".if_supports_color(Stream::Stderr, |t| t.red().bold().to_string())
    );
}

pub fn killed(message: &str) {
    println!("{}", message.if_supports_color(Stream::Stdout, |t| t.red()));
}
