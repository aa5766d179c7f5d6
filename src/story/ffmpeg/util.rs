use std::path::Path;

pub fn format_time(value: f64) -> String {
    format!("{value:.6}")
}

/// One `file '...'` line of a concat demuxer list.
pub fn concat_list_entry(path: &Path) -> String {
    format!("file '{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

/// Shell-quoted command line, for dry runs and debug output.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut words = Vec::with_capacity(args.len() + 1);
    words.push(program);
    words.extend(args.iter().map(String::as_str));
    shell_words::join(words)
}

pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
