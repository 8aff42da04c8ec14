//! Macro expansion for replacement templates.
//!
//! Expansion is a pure function of the template text and a [`MacroContext`]
//! assembled by the planner. Macro classes run in a fixed pipeline order;
//! each class rewrites all of its occurrences before the next class runs:
//!
//! 1. `%<digits>n` — sequence number, zero-padded to `digits + 1` places
//! 2. `%<group>{case}` — case transform of a capture group
//! 3. `%:{expr}` — scripted expression over the capture groups
//! 4. `%!{plugin:body}` — plugin-supplied values
//! 5. `%Y %m %d %H %M %S` — source file modification timestamp
//! 6. `%B` / `%E` — original stem and extension

use crate::expr;
use crate::plugin::PluginRegistry;
use chrono::{DateTime, Datelike, Local, Timelike};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

static SENTINEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[0-9A-Za-z:!]").expect("sentinel pattern"));
static SEQ_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%(\d*)n").expect("sequence pattern"));
static CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(\d)\{([a-z]+)\}").expect("case pattern"));
static EXPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%:\{([^}]+)\}").expect("expression pattern"));
static PLUGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%!\{(\w+):([^}]+)\}").expect("plugin pattern"));

#[derive(Debug, Error)]
pub enum MacroError {
    #[error("plugin '{name}': {message}")]
    Plugin { name: String, message: String },
}

/// Everything an expansion pass needs, computed once per entry.
pub struct MacroContext<'a> {
    /// Sequence number inserted by the `%n` macro family.
    pub start_index: u32,
    /// Source file the entry refers to.
    pub path: &'a Path,
    /// Capture groups from the find pattern; group 0 is the whole match
    /// (the literal find text when not using regular expressions).
    pub groups: &'a [String],
    /// Last-modification timestamp of the source file.
    pub modified: DateTime<Local>,
    /// Registry backing `%!{name:body}` macros. `None` leaves them verbatim.
    pub plugins: Option<&'a PluginRegistry>,
}

/// Whether `text` contains at least one macro sentinel. Planning skips
/// expansion (and the timestamp lookup behind it) when this is false.
pub fn has_macro(text: &str) -> bool {
    SENTINEL_RE.is_match(text)
}

pub fn expand(text: &str, ctx: &MacroContext) -> Result<String, MacroError> {
    let text = SEQ_RE
        .replace_all(text, |caps: &Captures| {
            let width = caps[1].len() + 1;
            format!("{:0width$}", ctx.start_index, width = width)
        })
        .into_owned();

    let text = CASE_RE
        .replace_all(&text, |caps: &Captures| {
            let group: usize = caps[1].parse().expect("single digit");
            match ctx.groups.get(group) {
                None => String::new(),
                Some(text) => case_transform(&caps[2], text),
            }
        })
        .into_owned();

    let text = EXPR_RE
        .replace_all(&text, |caps: &Captures| {
            expr::eval(&caps[1], ctx.groups)
                .unwrap_or_else(|_| ctx.groups.first().cloned().unwrap_or_default())
        })
        .into_owned();

    let text = expand_plugins(&text, ctx)?;

    let t = ctx.modified;
    let text = text
        .replace("%Y", &format!("{:04}", t.year()))
        .replace("%m", &format!("{:02}", t.month()))
        .replace("%d", &format!("{:02}", t.day()))
        .replace("%H", &format!("{:02}", t.hour()))
        .replace("%M", &format!("{:02}", t.minute()))
        .replace("%S", &format!("{:02}", t.second()));

    let base_name = ctx
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_base(&base_name);
    Ok(text.replace("%B", stem).replace("%E", ext))
}

fn expand_plugins(text: &str, ctx: &MacroContext) -> Result<String, MacroError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in PLUGIN_RE.captures_iter(text) {
        let whole = caps.get(0).expect("whole match");
        out.push_str(&text[last..whole.start()]);
        let name = &caps[1];
        let body = &caps[2];
        let expanded = match ctx.plugins {
            None => body.to_string(),
            Some(registry) => registry
                .eval(name, body, ctx.path, ctx.groups)
                .map_err(|e| MacroError::Plugin {
                    name: name.to_string(),
                    message: e.to_string(),
                })?,
        };
        out.push_str(&expanded);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Apply a named case transform. Unknown names pass the text through.
pub fn case_transform(kind: &str, text: &str) -> String {
    match kind {
        "upper" | "u" => text.to_uppercase(),
        "lower" | "l" => text.to_lowercase(),
        "capitalize" | "c" => capitalize(text),
        "title" | "t" => title_case(text),
        _ => text.to_string(),
    }
}

/// Uppercase the first character, lowercase the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
    }
}

/// Uppercase the first letter of every word, lowercase the rest. A word
/// starts after any non-alphabetic character.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Split a base name into stem and extension (with its leading dot). A dot
/// with no non-dot character before it starts no extension, so dotfiles keep
/// their whole name as the stem.
pub fn split_base(name: &str) -> (&str, &str) {
    if let Some(idx) = name.rfind('.') {
        if name[..idx].chars().any(|c| c != '.') {
            return (&name[..idx], &name[idx..]);
        }
    }
    (name, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ctx<'a>(groups: &'a [String], path: &'a Path) -> MacroContext<'a> {
        MacroContext {
            start_index: 1,
            path,
            groups,
            modified: Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap(),
            plugins: None,
        }
    }

    #[test]
    fn test_sentinel_detection() {
        assert!(has_macro("photo-%n"));
        assert!(has_macro("%Y-%m-%d"));
        assert!(has_macro("%:{m[1]}"));
        assert!(has_macro("%!{geo:%city%}"));
        assert!(!has_macro("plain-name"));
        assert!(!has_macro("100% done"));
        assert!(!has_macro("%-%."));
    }

    #[test]
    fn test_sequence_padding() {
        let groups = vec![String::new()];
        let path = Path::new("a.txt");
        let mut c = ctx(&groups, path);
        assert_eq!(expand("%n", &c).unwrap(), "1");
        assert_eq!(expand("%0n", &c).unwrap(), "01");
        assert_eq!(expand("%00n", &c).unwrap(), "001");
        c.start_index = 42;
        assert_eq!(expand("%n", &c).unwrap(), "42");
        assert_eq!(expand("%000n", &c).unwrap(), "0042");
    }

    #[test]
    fn test_case_macros() {
        let groups = vec!["img_501".to_string(), "img".to_string()];
        let path = Path::new("img_501.jpg");
        let c = ctx(&groups, path);
        assert_eq!(expand("%0{upper}", &c).unwrap(), "IMG_501");
        assert_eq!(expand("%1{u}", &c).unwrap(), "IMG");
        assert_eq!(expand("%0{capitalize}", &c).unwrap(), "Img_501");
        assert_eq!(expand("%0{title}", &c).unwrap(), "Img_501");
    }

    #[test]
    fn test_case_macro_out_of_range_group() {
        let groups = vec!["only".to_string()];
        let path = Path::new("a.txt");
        let c = ctx(&groups, path);
        assert_eq!(expand("x%7{upper}y", &c).unwrap(), "xy");
    }

    #[test]
    fn test_case_macro_unknown_name_passes_through() {
        let groups = vec!["MiXeD".to_string()];
        let path = Path::new("a.txt");
        let c = ctx(&groups, path);
        assert_eq!(expand("%0{shout}", &c).unwrap(), "MiXeD");
    }

    #[test]
    fn test_expression_macro() {
        let groups = vec!["IMG_501".to_string(), "501".to_string()];
        let path = Path::new("IMG_501.jpg");
        let c = ctx(&groups, path);
        assert_eq!(expand("%:{'nr-' + m[1]}", &c).unwrap(), "nr-501");
    }

    #[test]
    fn test_expression_error_falls_back_to_whole_match() {
        let groups = vec!["IMG_501".to_string()];
        let path = Path::new("IMG_501.jpg");
        let c = ctx(&groups, path);
        // m[9] is out of range; the macro degrades to group 0.
        assert_eq!(expand("%:{m[9]}", &c).unwrap(), "IMG_501");
    }

    #[test]
    fn test_plugin_macro_without_registry() {
        let groups = vec![String::new()];
        let path = Path::new("a.jpg");
        let c = ctx(&groups, path);
        assert_eq!(expand("%!{geo:%city%}", &c).unwrap(), "%city%");
    }

    #[test]
    fn test_timestamp_macros() {
        let groups = vec![String::new()];
        let path = Path::new("a.txt");
        let c = ctx(&groups, path);
        assert_eq!(expand("%Y-%m-%d", &c).unwrap(), "2024-03-07");
        assert_eq!(expand("%H_%M_%S", &c).unwrap(), "09_05_02");
    }

    #[test]
    fn test_basename_and_extension_macros() {
        let groups = vec![String::new()];
        let path = Path::new("/tmp/archive.tar.gz");
        let c = ctx(&groups, path);
        assert_eq!(expand("%B", &c).unwrap(), "archive.tar");
        assert_eq!(expand("%E", &c).unwrap(), ".gz");
        assert_eq!(expand("prefix-%B%E", &c).unwrap(), "prefix-archive.tar.gz");
    }

    #[test]
    fn test_pipeline_order() {
        let groups = vec!["doc".to_string()];
        let path = Path::new("doc.txt");
        let c = ctx(&groups, path);
        assert_eq!(
            expand("%n-%0{upper}-%Y-%B", &c).unwrap(),
            "1-DOC-2024-doc"
        );
    }

    #[test]
    fn test_split_base() {
        assert_eq!(split_base("a.txt"), ("a", ".txt"));
        assert_eq!(split_base("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_base("noext"), ("noext", ""));
        assert_eq!(split_base(".bashrc"), (".bashrc", ""));
        assert_eq!(split_base("name."), ("name", "."));
        assert_eq!(split_base(""), ("", ""));
    }

    #[test]
    fn test_title_case_word_boundaries() {
        assert_eq!(title_case("hello world"), "Hello World");
        assert_eq!(title_case("ab2cd"), "Ab2Cd");
        assert_eq!(title_case("UPPER lower"), "Upper Lower");
    }

    proptest! {
        #[test]
        fn prop_upper_idempotent(s in "[ -~]*") {
            let once = case_transform("upper", &s);
            prop_assert_eq!(case_transform("upper", &once), once.clone());
        }

        #[test]
        fn prop_capitalize_idempotent(s in "[ -~]*") {
            let once = capitalize(&s);
            prop_assert_eq!(capitalize(&once), once.clone());
        }

        #[test]
        fn prop_title_idempotent(s in "[ -~]*") {
            let once = title_case(&s);
            prop_assert_eq!(title_case(&once), once.clone());
        }
    }
}
