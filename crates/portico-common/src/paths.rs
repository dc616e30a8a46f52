use std::path::{Path, PathBuf};

const HOME_PLACEHOLDERS: [&str; 3] = ["~", "$HOME", "${HOME}"];

pub fn expand_home(raw: &str) -> PathBuf {
    match dirs::home_dir() {
        Some(home) => expand_home_with(raw, &home),
        None => PathBuf::from(raw),
    }
}

pub fn expand_home_with(raw: &str, home: &Path) -> PathBuf {
    let trimmed = raw.trim();
    for placeholder in HOME_PLACEHOLDERS {
        let Some(rest) = trimmed.strip_prefix(placeholder) else {
            continue;
        };
        if rest.is_empty() {
            return home.to_path_buf();
        }
        if !rest.starts_with(['/', '\\']) {
            // `~user` style prefixes are not expanded.
            continue;
        }
        return rest
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .fold(home.to_path_buf(), |acc, segment| acc.join(segment));
    }
    PathBuf::from(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_tilde_with_either_separator() {
        let home = Path::new("/home/tester");
        assert_eq!(
            expand_home_with("~/.portico/anthropic", home),
            home.join(".portico").join("anthropic")
        );
        assert_eq!(
            expand_home_with("~\\.portico\\anthropic", home),
            home.join(".portico").join("anthropic")
        );
    }

    #[test]
    fn bare_placeholder_is_home() {
        let home = Path::new("/home/tester");
        assert_eq!(expand_home_with("~", home), home);
        assert_eq!(expand_home_with("$HOME", home), home);
        assert_eq!(expand_home_with("${HOME}/x", home), home.join("x"));
    }

    #[test]
    fn leaves_other_paths_untouched() {
        let home = Path::new("/home/tester");
        assert_eq!(expand_home_with("/opt/cfg", home), PathBuf::from("/opt/cfg"));
        assert_eq!(expand_home_with("~bob/cfg", home), PathBuf::from("~bob/cfg"));
        assert_eq!(expand_home_with("rel/dir", home), PathBuf::from("rel/dir"));
    }
}
