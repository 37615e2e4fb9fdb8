//! Layered flag configuration.
//!
//! Defaults live in plain files holding the same flags the command line
//! accepts, one or more per line. The global file is read first, then a
//! `.flintrc` in the working directory, then the command line itself; later
//! layers win for valued options and add to boolean ones.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::ui::Style;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub no_images: bool,
    pub no_diagrams: bool,
    pub style: Option<Style>,
    pub render_workers: Option<usize>,
    pub render_timeout: Option<u64>,
    pub mermaid_endpoint: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            no_images: self.no_images || other.no_images,
            no_diagrams: self.no_diagrams || other.no_diagrams,
            style: other.style.or(self.style),
            render_workers: other.render_workers.or(self.render_workers),
            render_timeout: other.render_timeout.or(self.render_timeout),
            mermaid_endpoint: other
                .mermaid_endpoint
                .clone()
                .or_else(|| self.mermaid_endpoint.clone()),
            cache_dir: other.cache_dir.clone().or_else(|| self.cache_dir.clone()),
            log_file: other.log_file.clone().or_else(|| self.log_file.clone()),
        }
    }

    pub fn render_timeout(&self) -> Option<Duration> {
        self.render_timeout.map(Duration::from_secs)
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("flint").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("flint")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("flint").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("flint").join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".flintrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# flint defaults (saved with --save)".to_string()];
    for (enabled, flag) in [
        (flags.watch, "--watch"),
        (flags.no_images, "--no-images"),
        (flags.no_diagrams, "--no-diagrams"),
    ] {
        if enabled {
            lines.push(flag.to_string());
        }
    }
    if let Some(style) = flags.style {
        lines.push(format!("--style {}", style.name()));
    }
    if let Some(workers) = flags.render_workers {
        lines.push(format!("--render-workers {workers}"));
    }
    if let Some(secs) = flags.render_timeout {
        lines.push(format!("--render-timeout {secs}"));
    }
    if let Some(endpoint) = &flags.mermaid_endpoint {
        lines.push(format!("--mermaid-endpoint {endpoint}"));
    }
    if let Some(dir) = &flags.cache_dir {
        lines.push(format!("--cache-dir {}", dir.display()));
    }
    if let Some(log) = &flags.log_file {
        lines.push(format!("--log-file {}", log.display()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the flags this module knows out of raw argument tokens. Unknown
/// tokens and unparsable values are skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        match token {
            "--watch" | "-w" => flags.watch = true,
            "--no-images" => flags.no_images = true,
            "--no-diagrams" => flags.no_diagrams = true,
            _ => {
                if let Some((name, value, consumed)) = split_valued(tokens, i) {
                    apply_value(&mut flags, name, value);
                    i += consumed;
                }
            }
        }
        i += 1;
    }
    flags
}

const VALUED: &[&str] = &[
    "--style",
    "--render-workers",
    "--render-timeout",
    "--mermaid-endpoint",
    "--cache-dir",
    "--log-file",
];

/// `--name value` or `--name=value`. Returns the name, the value and how
/// many extra tokens were consumed.
fn split_valued(tokens: &[String], i: usize) -> Option<(&'static str, &str, usize)> {
    let token = tokens[i].as_str();
    VALUED.iter().find_map(|&name| {
        if token == name {
            tokens.get(i + 1).map(|next| (name, next.as_str(), 1))
        } else {
            token
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|value| (name, value, 0))
        }
    })
}

fn apply_value(flags: &mut ConfigFlags, name: &str, value: &str) {
    match name {
        "--style" => flags.style = Style::from_name(value),
        "--render-workers" => {
            flags.render_workers = value.parse().ok().filter(|n: &usize| *n > 0);
        }
        "--render-timeout" => flags.render_timeout = value.parse().ok().filter(|s: &u64| *s > 0),
        "--mermaid-endpoint" => flags.mermaid_endpoint = Some(value.to_string()),
        "--cache-dir" => flags.cache_dir = Some(PathBuf::from(value)),
        "--log-file" => flags.log_file = Some(PathBuf::from(value)),
        _ => {}
    }
}
