use std::env;
use std::path::PathBuf;

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// The user's home directory: `HOME`, then `USERPROFILE` on Windows.
pub fn home_dir() -> Result<PathBuf, String> {
    non_empty_var("HOME")
        .or_else(|| non_empty_var("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or_else(|| "Home directory not set".to_string())
}

/// `$XDG_CONFIG_HOME/iris`, falling back to `~/.config/iris`.
///
/// Holds `config.json` and the `store/` directory of the local key-value
/// store.
pub fn config_dir() -> Result<PathBuf, String> {
    match non_empty_var("XDG_CONFIG_HOME") {
        Some(xdg) => Ok(PathBuf::from(xdg).join("iris")),
        None => Ok(home_dir()?.join(".config").join("iris")),
    }
}

#[cfg(test)]
mod tests {
    use super::{config_dir, home_dir};
    use std::env;
    use std::path::PathBuf;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        let previous: Vec<_> = vars
            .iter()
            .map(|(name, _)| (name.to_string(), env::var(name).ok()))
            .collect();

        for (name, value) in vars {
            match value {
                Some(value) => env::set_var(name, value),
                None => env::remove_var(name),
            }
        }

        f();

        for (name, value) in previous {
            match value {
                Some(value) => env::set_var(&name, value),
                None => env::remove_var(&name),
            }
        }
    }

    #[test]
    fn home_prefers_home_over_userprofile() {
        with_env(
            &[("HOME", Some("/tmp/home")), ("USERPROFILE", Some("/tmp/profile"))],
            || assert_eq!(home_dir().unwrap(), PathBuf::from("/tmp/home")),
        );
    }

    #[test]
    fn empty_home_falls_back_to_userprofile() {
        with_env(&[("HOME", Some("")), ("USERPROFILE", Some("/tmp/profile"))], || {
            assert_eq!(home_dir().unwrap(), PathBuf::from("/tmp/profile"));
        });
    }

    #[test]
    fn no_home_is_an_error() {
        with_env(&[("HOME", None), ("USERPROFILE", None)], || {
            assert!(home_dir().is_err());
        });
    }

    #[test]
    fn config_dir_uses_xdg_when_set() {
        with_env(&[("XDG_CONFIG_HOME", Some("/tmp/xdg"))], || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/tmp/xdg/iris"));
        });
    }

    #[test]
    fn config_dir_defaults_under_home() {
        with_env(
            &[("XDG_CONFIG_HOME", None), ("HOME", Some("/tmp/home"))],
            || {
                assert_eq!(
                    config_dir().unwrap(),
                    PathBuf::from("/tmp/home/.config/iris")
                );
            },
        );
    }
}
