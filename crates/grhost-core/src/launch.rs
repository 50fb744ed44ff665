use derive_builder::Builder;
use std::collections::HashMap;
use std::path::PathBuf;

/// Native window handle the game render host draws into. Zero means "no window".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

impl WindowHandle {
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for WindowHandle {
    fn from(value: u64) -> Self {
        WindowHandle(value)
    }
}

/// Immutable descriptor of one game render host launch.
///
/// `args()` renders the argument line handed to the runtime host. Handles,
/// paths and flags that are not meaningfully set are omitted rather than
/// written as zero or empty values; `--display0` is always present.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into))]
pub struct LaunchSpec {
    /// Runtime host executable, usually resolved from a mounted runtime package
    pub runtime_host: PathBuf,
    #[builder(default)]
    pub variation: String,
    #[builder(default)]
    pub denomination: u64,
    #[builder(default)]
    pub bottom_window: WindowHandle,
    #[builder(default)]
    pub top_window: WindowHandle,
    #[builder(default)]
    pub button_deck_window: WindowHandle,
    #[builder(default)]
    pub topper_window: WindowHandle,
    /// Game binary loaded by the runtime host
    #[builder(default)]
    pub game: PathBuf,
    #[builder(default)]
    pub log: PathBuf,
    #[builder(default)]
    pub jurisdiction: String,
    #[builder(default)]
    pub central_determinant: bool,
    /// Frame rate cap; zero leaves the host's own default in place
    #[builder(default)]
    pub fps: u32,
    #[builder(default)]
    #[builder(setter(custom))]
    pub extra_args: Vec<String>,
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
    #[builder(default, setter(into, strip_option))]
    pub working_directory: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn builder() -> LaunchSpecBuilder {
        LaunchSpecBuilder::default()
    }

    /// Argument line in a fixed, deterministic order
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();

        push_value(&mut args, "--display0", self.bottom_window.0.to_string());
        let secondary = [
            ("--display1", self.top_window),
            ("--display2", self.button_deck_window),
            ("--display3", self.topper_window),
        ];
        for (flag, handle) in secondary {
            if handle.is_set() {
                push_value(&mut args, flag, handle.0.to_string());
            }
        }

        if self.fps > 0 {
            push_value(&mut args, "--fps", self.fps.to_string());
        }
        if !self.game.as_os_str().is_empty() {
            push_value(&mut args, "--game", self.game.to_string_lossy().into_owned());
        }
        if !self.log.as_os_str().is_empty() {
            push_value(&mut args, "--log", self.log.to_string_lossy().into_owned());
        }
        if !self.variation.is_empty() {
            push_value(&mut args, "--variation", self.variation.clone());
        }
        if self.denomination > 0 {
            push_value(&mut args, "--denomination", self.denomination.to_string());
        }
        if !self.jurisdiction.is_empty() {
            push_value(&mut args, "--jurisdiction", self.jurisdiction.clone());
        }
        if self.central_determinant {
            args.push("--cds".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// The argument line as a single string, quoting values that contain whitespace
    pub fn command_line(&self) -> String {
        self.args()
            .iter()
            .map(|arg| {
                if arg.is_empty() || arg.chars().any(char::is_whitespace) {
                    format!("\"{}\"", arg.replace('"', "\\\""))
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn push_value(args: &mut Vec<String>, flag: &str, value: String) {
    args.push(flag.to_string());
    args.push(value);
}

impl LaunchSpecBuilder {
    pub fn extra_args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.extra_args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LaunchSpecBuilder {
        let mut builder = LaunchSpec::builder();
        builder.runtime_host("/opt/runtimes/1.0.5/GameRenderHost");
        builder
    }

    #[test]
    fn test_display0_always_present() {
        let spec = base().build().unwrap();
        assert_eq!(spec.args(), vec!["--display0", "0"]);
    }

    #[test]
    fn test_unset_secondary_windows_are_omitted() {
        let spec = base()
            .bottom_window(0x1001u64)
            .top_window(0u64)
            .button_deck_window(0x2002u64)
            .topper_window(0u64)
            .build()
            .unwrap();

        let args = spec.args();
        assert_eq!(args, vec!["--display0", "4097", "--display2", "8194"]);
        assert!(!args.iter().any(|a| a == "--display1"));
        assert!(!args.iter().any(|a| a == "--display3"));
    }

    #[test]
    fn test_full_argument_line_order() {
        let spec = base()
            .bottom_window(1u64)
            .top_window(2u64)
            .button_deck_window(3u64)
            .topper_window(4u64)
            .fps(60u32)
            .game("/games/buffalo/game.so")
            .log("/var/log/game")
            .variation("99")
            .denomination(1000u64)
            .jurisdiction("NV")
            .central_determinant(true)
            .extra_args(["--windowed"])
            .build()
            .unwrap();

        assert_eq!(
            spec.command_line(),
            "--display0 1 --display1 2 --display2 3 --display3 4 --fps 60 \
             --game /games/buffalo/game.so --log /var/log/game --variation 99 \
             --denomination 1000 --jurisdiction NV --cds --windowed"
        );
    }

    #[test]
    fn test_zero_values_are_not_written() {
        let spec = base()
            .fps(0u32)
            .denomination(0u64)
            .central_determinant(false)
            .build()
            .unwrap();

        let line = spec.command_line();
        assert!(!line.contains("--fps"));
        assert!(!line.contains("--denomination"));
        assert!(!line.contains("--cds"));
    }

    #[test]
    fn test_whitespace_values_are_quoted() {
        let spec = base()
            .game("/games/Lucky Seven/game.so")
            .build()
            .unwrap();
        assert!(
            spec.command_line()
                .ends_with("--game \"/games/Lucky Seven/game.so\"")
        );
    }

    #[test]
    fn test_command_line_is_deterministic() {
        let spec = base()
            .jurisdiction("ON")
            .env("RUST_LOG", "debug")
            .build()
            .unwrap();
        assert_eq!(spec.command_line(), spec.clone().command_line());
        assert_eq!(spec.env.get("RUST_LOG").map(String::as_str), Some("debug"));
    }
}
