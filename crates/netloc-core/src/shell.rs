//! Shell proxy environment.
//!
//! Renders a [`ResolvedProxy`] as variable assignments for a shell family
//! and keeps exactly one marker-delimited copy of that block in each rc
//! file. Applying the same resolution twice leaves the file untouched;
//! removing a block that is not there is a no-op.
//!
//! Text outside the markers is never modified, except that a newline is
//! added before an appended block when the file did not end with one.

use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use crate::error::CoreError;
use crate::model::ResolvedProxy;

pub const BLOCK_START: &str = "# >>> netloc proxy >>>";
pub const BLOCK_END: &str = "# <<< netloc proxy <<<";

/// Variables that carry the full proxy URL, emitted in both cases.
const URL_VARS: &[&str] = &["http_proxy", "https_proxy", "ftp_proxy", "all_proxy"];

// ── Dialects and shells ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ShellDialect {
    /// `export VAR="value"`
    Posix,
    /// `setenv VAR "value"`
    Csh,
    /// `set -gx VAR "value"`
    Fish,
}

impl ShellDialect {
    fn assign(self, name: &str, value: &str) -> String {
        let value = value.replace('\\', "\\\\").replace('"', "\\\"");
        match self {
            Self::Posix => format!("export {name}=\"{value}\""),
            Self::Csh => format!("setenv {name} \"{value}\""),
            Self::Fish => format!("set -gx {name} \"{value}\""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    Bash,
    Zsh,
    Tcsh,
    Csh,
    Fish,
}

impl ShellKind {
    pub fn dialect(self) -> ShellDialect {
        match self {
            Self::Bash | Self::Zsh => ShellDialect::Posix,
            Self::Tcsh | Self::Csh => ShellDialect::Csh,
            Self::Fish => ShellDialect::Fish,
        }
    }

    /// The rc file netloc writes for this shell.
    pub fn rc_file(self, home: &Path) -> PathBuf {
        match self {
            Self::Bash => home.join(".bash_profile"),
            Self::Zsh => home.join(".zshrc"),
            Self::Tcsh => home.join(".tcshrc"),
            Self::Csh => home.join(".cshrc"),
            Self::Fish => home.join(".config/fish/config.fish"),
        }
    }

    fn evidence(self, home: &Path) -> Vec<PathBuf> {
        match self {
            Self::Bash => vec![home.join(".bash_profile"), home.join(".bashrc")],
            other => vec![other.rc_file(home)],
        }
    }

    /// The login shell first, then every other shell with an existing
    /// rc file, in declaration order.
    pub fn detect(home: &Path, login_shell: Option<&str>) -> Vec<ShellKind> {
        let mut kinds = Vec::new();

        let primary = login_shell
            .and_then(|s| Path::new(s).file_name())
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<ShellKind>().ok());
        if let Some(primary) = primary {
            kinds.push(primary);
        }

        for kind in ShellKind::iter() {
            if !kinds.contains(&kind) && kind.evidence(home).iter().any(|p| p.exists()) {
                kinds.push(kind);
            }
        }

        kinds
    }
}

// ── Rendering ────────────────────────────────────────────────────────

/// The marker block for `resolved`, or `None` when there is no proxy.
pub fn render(resolved: &ResolvedProxy, dialect: ShellDialect) -> Option<String> {
    let url = resolved.url()?;
    let host_port = resolved.host_port()?;
    let no_proxy = resolved.no_proxy_list();

    let mut lines = vec![
        BLOCK_START.to_owned(),
        "# Managed by netloc. Edits inside this block are overwritten.".to_owned(),
    ];
    for name in URL_VARS {
        lines.push(dialect.assign(name, &url));
    }
    for name in URL_VARS {
        lines.push(dialect.assign(&name.to_ascii_uppercase(), &url));
    }
    // rsync wants host:port with no scheme.
    lines.push(dialect.assign("rsync_proxy", &host_port));
    lines.push(dialect.assign("no_proxy", &no_proxy));
    lines.push(dialect.assign("NO_PROXY", &no_proxy));
    lines.push(BLOCK_END.to_owned());

    let mut block = lines.join("\n");
    block.push('\n');
    Some(block)
}

// ── rc file maintenance ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShellChange {
    Written,
    Removed,
    Unchanged,
}

/// Ensure `rc` holds exactly the block for `resolved`. A resolution with
/// no proxy removes the block instead.
pub fn apply(rc: &Path, resolved: &ResolvedProxy, dialect: ShellDialect) -> Result<ShellChange, CoreError> {
    let Some(block) = render(resolved, dialect) else {
        return remove(rc);
    };

    let current = read_or_empty(rc)?;
    let updated = match locate_block(&current).map_err(|e| file_error(rc, e))? {
        Some(found) => {
            let mut updated = current.clone();
            updated.replace_range(found.range, &placed(&block, found.detached));
            updated
        }
        None if current.is_empty() || current.ends_with('\n') => format!("{current}{block}"),
        None => format!("{current}{}", placed(&block, true)),
    };

    if updated == current {
        return Ok(ShellChange::Unchanged);
    }
    write_atomic(rc, &updated)?;
    debug!(path = %rc.display(), "shell proxy block written");
    Ok(ShellChange::Written)
}

/// Strip the block from `rc`. Missing file or missing block is a no-op.
/// A file left with nothing but the block is deleted.
pub fn remove(rc: &Path) -> Result<ShellChange, CoreError> {
    let current = read_or_empty(rc)?;
    let Some(found) = locate_block(&current).map_err(|e| file_error(rc, e))? else {
        return Ok(ShellChange::Unchanged);
    };

    let mut updated = current;
    updated.replace_range(found.range, "");
    if updated.is_empty() {
        fs::remove_file(rc).map_err(|e| file_error(rc, e))?;
    } else {
        write_atomic(rc, &updated)?;
    }
    debug!(path = %rc.display(), "shell proxy block removed");
    Ok(ShellChange::Removed)
}

/// The block as written into a file. After content that lacks a final
/// newline, the separating newline opens the block and the end marker
/// closes the file, so removal gives the original bytes back.
fn placed(block: &str, detached: bool) -> String {
    if detached {
        format!("\n{}", block.trim_end_matches('\n'))
    } else {
        block.to_owned()
    }
}

struct Located {
    range: Range<usize>,
    detached: bool,
}

/// Byte range of the marker block including its trailing newline, or its
/// leading separator when the block closes the file without one.
fn locate_block(content: &str) -> Result<Option<Located>, io::Error> {
    let mut offset = 0;
    let mut start = None;

    for line in content.split_inclusive('\n') {
        let text = line.trim_end_matches(['\n', '\r']);
        match start {
            None if text == BLOCK_START => start = Some(offset),
            Some(begin) if text == BLOCK_END => {
                let end = offset + line.len();
                let detached = !line.ends_with('\n') && begin > 0 && content[..begin].ends_with('\n');
                let range = if detached { begin - 1..end } else { begin..end };
                return Ok(Some(Located { range, detached }));
            }
            _ => {}
        }
        offset += line.len();
    }

    match start {
        Some(_) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("found '{BLOCK_START}' without a matching '{BLOCK_END}'"),
        )),
        None => Ok(None),
    }
}

fn read_or_empty(path: &Path) -> Result<String, CoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(file_error(path, e)),
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| file_error(path, e))?;
    }
    let name = path
        .file_name()
        .map_or_else(|| "rc".into(), |n| n.to_string_lossy().into_owned());
    let tmp = path.with_file_name(format!(".{name}.netloc.tmp"));

    fs::write(&tmp, content).map_err(|e| file_error(path, e))?;
    fs::rename(&tmp, path).map_err(|e| file_error(path, e))
}

fn file_error(path: &Path, source: io::Error) -> CoreError {
    CoreError::ShellFile {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use indexmap::IndexSet;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::model::{ProxyEndpoint, ProxyKind};

    fn proxy(host: &str, port: u16) -> ResolvedProxy {
        ResolvedProxy::from_endpoint(
            ProxyEndpoint {
                kind: ProxyKind::Http,
                host: host.into(),
                port,
            },
            IndexSet::from(["localhost".to_owned(), "corp.example.com".to_owned()]),
        )
    }

    const USER_RC: &str = "export PATH=\"$HOME/bin:$PATH\"\nalias ll='ls -l'\n";

    #[test]
    fn posix_block() {
        let block = render(&proxy("p1", 8080), ShellDialect::Posix).unwrap();
        let lines: Vec<&str> = block.lines().collect();

        assert_eq!(lines.first(), Some(&BLOCK_START));
        assert_eq!(lines.last(), Some(&BLOCK_END));
        assert!(lines.contains(&"export http_proxy=\"http://p1:8080\""));
        assert!(lines.contains(&"export HTTPS_PROXY=\"http://p1:8080\""));
        assert!(lines.contains(&"export rsync_proxy=\"p1:8080\""));
        assert!(lines.contains(&"export no_proxy=\"localhost,corp.example.com\""));
        assert!(lines.contains(&"export NO_PROXY=\"localhost,corp.example.com\""));
    }

    #[test]
    fn csh_and_fish_syntax() {
        let csh = render(&proxy("p1", 8080), ShellDialect::Csh).unwrap();
        assert!(csh.contains("setenv all_proxy \"http://p1:8080\"\n"));
        assert!(!csh.contains("export"));

        let fish = render(&proxy("p1", 8080), ShellDialect::Fish).unwrap();
        assert!(fish.contains("set -gx ftp_proxy \"http://p1:8080\"\n"));
    }

    #[test]
    fn no_proxy_renders_nothing() {
        assert_eq!(render(&ResolvedProxy::none(), ShellDialect::Posix), None);
    }

    #[test]
    fn apply_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let rc = dir.path().join(".zshrc");
        fs::write(&rc, USER_RC).unwrap();

        assert_eq!(apply(&rc, &proxy("p1", 8080), ShellDialect::Posix).unwrap(), ShellChange::Written);
        let once = fs::read_to_string(&rc).unwrap();
        assert_eq!(apply(&rc, &proxy("p1", 8080), ShellDialect::Posix).unwrap(), ShellChange::Unchanged);
        let twice = fs::read_to_string(&rc).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.matches(BLOCK_START).count(), 1);
    }

    #[test]
    fn apply_replaces_existing_block_in_place() {
        let dir = TempDir::new().unwrap();
        let rc = dir.path().join(".bash_profile");
        fs::write(&rc, USER_RC).unwrap();

        apply(&rc, &proxy("p1", 8080), ShellDialect::Posix).unwrap();
        fs::write(&rc, format!("{}# trailing user line\n", fs::read_to_string(&rc).unwrap())).unwrap();
        apply(&rc, &proxy("p2", 3128), ShellDialect::Posix).unwrap();

        let content = fs::read_to_string(&rc).unwrap();
        assert!(content.starts_with(USER_RC));
        assert!(content.ends_with("# trailing user line\n"));
        assert!(content.contains("p2:3128"));
        assert!(!content.contains("p1:8080"));
        assert_eq!(content.matches(BLOCK_END).count(), 1);
    }

    #[test]
    fn apply_then_remove_restores_file() {
        let dir = TempDir::new().unwrap();
        let rc = dir.path().join(".cshrc");
        fs::write(&rc, USER_RC).unwrap();

        apply(&rc, &proxy("p1", 8080), ShellDialect::Csh).unwrap();
        assert_eq!(remove(&rc).unwrap(), ShellChange::Removed);

        assert_eq!(fs::read_to_string(&rc).unwrap(), USER_RC);
    }

    #[test]
    fn round_trip_keeps_missing_final_newline() {
        let dir = TempDir::new().unwrap();
        let rc = dir.path().join(".zshrc");
        let before = "alias ll='ls -l'";
        fs::write(&rc, before).unwrap();

        apply(&rc, &proxy("p1", 8080), ShellDialect::Posix).unwrap();
        assert_eq!(apply(&rc, &proxy("p1", 8080), ShellDialect::Posix).unwrap(), ShellChange::Unchanged);
        apply(&rc, &proxy("p2", 3128), ShellDialect::Posix).unwrap();
        let applied = fs::read_to_string(&rc).unwrap();
        assert!(applied.starts_with(&format!("{before}\n{BLOCK_START}\n")));
        assert_eq!(applied.matches(BLOCK_START).count(), 1);

        assert_eq!(remove(&rc).unwrap(), ShellChange::Removed);
        assert_eq!(fs::read_to_string(&rc).unwrap(), before);
    }

    #[test]
    fn round_trip_on_missing_file_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let rc = dir.path().join(".tcshrc");

        apply(&rc, &proxy("p1", 8080), ShellDialect::Csh).unwrap();
        assert!(rc.exists());
        assert_eq!(remove(&rc).unwrap(), ShellChange::Removed);
        assert!(!rc.exists());
    }

    #[test]
    fn remove_without_block_or_file_is_noop() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join(".tcshrc");
        assert_eq!(remove(&missing).unwrap(), ShellChange::Unchanged);
        assert!(!missing.exists());

        let rc = dir.path().join(".zshrc");
        fs::write(&rc, USER_RC).unwrap();
        assert_eq!(remove(&rc).unwrap(), ShellChange::Unchanged);
        assert_eq!(fs::read_to_string(&rc).unwrap(), USER_RC);
    }

    #[test]
    fn applying_no_proxy_removes_block() {
        let dir = TempDir::new().unwrap();
        let rc = dir.path().join(".zshrc");
        fs::write(&rc, USER_RC).unwrap();

        apply(&rc, &proxy("p1", 8080), ShellDialect::Posix).unwrap();
        assert_eq!(apply(&rc, &ResolvedProxy::none(), ShellDialect::Posix).unwrap(), ShellChange::Removed);
        assert_eq!(fs::read_to_string(&rc).unwrap(), USER_RC);
    }

    #[test]
    fn creates_missing_fish_config() {
        let dir = TempDir::new().unwrap();
        let rc = ShellKind::Fish.rc_file(dir.path());

        apply(&rc, &proxy("p1", 8080), ShellDialect::Fish).unwrap();
        assert!(fs::read_to_string(&rc).unwrap().starts_with(BLOCK_START));
    }

    #[test]
    fn unterminated_block_is_refused() {
        let dir = TempDir::new().unwrap();
        let rc = dir.path().join(".zshrc");
        fs::write(&rc, format!("{USER_RC}{BLOCK_START}\nexport x=1\n")).unwrap();

        let err = apply(&rc, &proxy("p1", 8080), ShellDialect::Posix).unwrap_err();
        assert!(matches!(err, CoreError::ShellFile { .. }));
    }

    #[test]
    fn detection_puts_login_shell_first() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".bashrc"), "").unwrap();
        fs::write(dir.path().join(".tcshrc"), "").unwrap();

        let kinds = ShellKind::detect(dir.path(), Some("/bin/zsh"));
        assert_eq!(kinds, vec![ShellKind::Zsh, ShellKind::Bash, ShellKind::Tcsh]);

        let kinds = ShellKind::detect(dir.path(), Some("/usr/local/bin/tcsh"));
        assert_eq!(kinds, vec![ShellKind::Tcsh, ShellKind::Bash]);

        assert!(ShellKind::detect(TempDir::new().unwrap().path(), None).is_empty());
    }
}
