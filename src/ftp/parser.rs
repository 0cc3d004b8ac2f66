//! Reply-payload parsers: LIST/MLSD listings, MLSx timestamps, and the
//! quoted PWD path.
//!
//! Listing formats handled:
//! 1. **MLSD facts** (RFC 3659): `type=file;size=1234;modify=20260101120000; file.txt`
//! 2. **Unix-style** (`ls -l`): `-rwxr-xr-x 1 owner group 1234 Jan  1 12:00 file.txt`
//! 3. **Windows/IIS-style**: `01-01-26  12:00AM       1234 file.txt`
//!
//! Selection is automatic per line: MLSD first (when the line carries
//! `=` and `;`), then Unix, then Windows, with an opaque fallback entry
//! for anything unrecognized.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::{FileInfo, FileKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNIX_RE: Regex = Regex::new(
        r"(?x)
        ^([dlcbps-][rwxsStT-]{9})\s+    # permissions
        (\d+)\s+                        # link count
        (\S+)\s+                        # owner
        (\S+)\s+                        # group
        (\d+)\s+                        # size
        (\w{3}\s+\d{1,2}\s+[\d:]+)\s+   # date
        (.+)$                           # name (possibly with -> target)
        ",
    )
    .unwrap();
    static ref WINDOWS_RE: Regex = Regex::new(
        r"(?x)
        ^(\d{2}-\d{2}-\d{2,4})\s+       # date
        (\d{1,2}:\d{2}(?:AM|PM)?)\s+    # time
        (<DIR>|\d+)\s+                  # size or <DIR>
        (.+)$                           # name
        ",
    )
    .unwrap();
}

/// Parse a full listing body into entries. `.` and `..` are dropped.
pub fn parse(raw: &str) -> Vec<FileInfo> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(parse_line)
        .filter(|e| e.name != "." && e.name != "..")
        .collect()
}

fn parse_line(line: &str) -> Option<FileInfo> {
    if line.contains(';') && line.contains('=') {
        if let Some(entry) = parse_mlsd(line) {
            return Some(entry);
        }
    }
    if let Some(entry) = parse_unix(line) {
        return Some(entry);
    }
    if let Some(entry) = parse_windows(line) {
        return Some(entry);
    }
    // Unknown dialect: keep the line visible rather than dropping it.
    Some(FileInfo::new(line))
}

// ─── MLSD ────────────────────────────────────────────────────────────

/// Parse an MLSD fact line: `fact1=val1;fact2=val2; filename`.
fn parse_mlsd(line: &str) -> Option<FileInfo> {
    let (facts_str, name) = if let Some(pos) = line.find("; ") {
        (&line[..pos + 1], &line[pos + 2..])
    } else if let Some(pos) = line.rfind(' ') {
        (&line[..pos], &line[pos + 1..])
    } else {
        return None;
    };
    if name.is_empty() {
        return None;
    }

    let mut entry = FileInfo::new(name);
    for segment in facts_str.split(';') {
        if let Some((key, value)) = segment.trim().split_once('=') {
            entry.facts.insert(key.to_lowercase(), value.to_string());
        }
    }

    entry.kind = match entry.facts.get("type").map(|t| t.to_lowercase()).as_deref() {
        Some("dir") | Some("cdir") | Some("pdir") => FileKind::Directory,
        Some("file") => FileKind::File,
        Some(t) if t.contains("symlink") || t.contains("slink") => FileKind::Symlink,
        _ => FileKind::Unknown,
    };
    entry.size = entry
        .facts
        .get("size")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    entry.modified = entry
        .facts
        .get("modify")
        .and_then(|v| parse_mlsx_date(v).ok());
    entry.permissions = entry.facts.get("unix.mode").cloned();
    entry.owner = entry.facts.get("unix.owner").cloned();
    entry.group = entry.facts.get("unix.group").cloned();
    Some(entry)
}

/// Parse an MLSx timestamp: `YYYYMMDDHHMMSS` with an optional fraction,
/// always UTC. Used for both MLSD `modify` facts and MDTM replies.
pub fn parse_mlsx_date(s: &str) -> FtpResult<DateTime<Utc>> {
    let base = s.get(..14).unwrap_or(s);
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .map(|dt| Utc.from_utc_datetime(&dt))
        .map_err(|_| FtpError::parse(format!("cannot parse MLSx timestamp: {}", s)))
}

// ─── Unix ────────────────────────────────────────────────────────────

fn parse_unix(line: &str) -> Option<FileInfo> {
    let caps = UNIX_RE.captures(line)?;

    let permissions = caps.get(1)?.as_str();
    let kind = match permissions.as_bytes().first() {
        Some(b'd') => FileKind::Directory,
        Some(b'l') => FileKind::Symlink,
        Some(b'-') => FileKind::File,
        _ => FileKind::Unknown,
    };

    let name_raw = caps.get(7)?.as_str();
    let (name, link_target) = match kind {
        FileKind::Symlink => match name_raw.split_once(" -> ") {
            Some((name, target)) => (name, Some(target.to_string())),
            None => (name_raw, None),
        },
        _ => (name_raw, None),
    };

    let mut entry = FileInfo::new(name);
    entry.kind = kind;
    entry.size = caps.get(5)?.as_str().parse::<u64>().unwrap_or(0);
    entry.modified = parse_unix_date(caps.get(6)?.as_str());
    entry.permissions = Some(permissions.to_string());
    entry.owner = caps.get(3).map(|m| m.as_str().to_string());
    entry.group = caps.get(4).map(|m| m.as_str().to_string());
    entry.link_target = link_target;
    Some(entry)
}

/// Parse the date column: `Jan  1 12:00` (current year implied) or
/// `Jan  1  2025`.
fn parse_unix_date(s: &str) -> Option<DateTime<Utc>> {
    let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");

    let current_year = Utc::now().format("%Y").to_string();
    if let Ok(dt) = NaiveDateTime::parse_from_str(
        &format!("{} {}", current_year, normalized),
        "%Y %b %d %H:%M",
    ) {
        return Some(Utc.from_utc_datetime(&dt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%b %d %Y") {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&date.and_time(midnight)));
    }

    None
}

// ─── Windows / IIS ───────────────────────────────────────────────────

fn parse_windows(line: &str) -> Option<FileInfo> {
    let caps = WINDOWS_RE.captures(line)?;

    let date = caps.get(1)?.as_str();
    let time = caps.get(2)?.as_str();
    let size_or_dir = caps.get(3)?.as_str();

    let mut entry = FileInfo::new(caps.get(4)?.as_str());
    if size_or_dir == "<DIR>" {
        entry.kind = FileKind::Directory;
    } else {
        entry.kind = FileKind::File;
        entry.size = size_or_dir.parse::<u64>().unwrap_or(0);
    }
    entry.modified = parse_windows_date(date, time);
    Some(entry)
}

fn parse_windows_date(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{} {}", date, time);
    for format in ["%m-%d-%y %I:%M%p", "%m-%d-%y %H:%M", "%m-%d-%Y %I:%M%p", "%m-%d-%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&combined, format) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}

// ─── PWD ─────────────────────────────────────────────────────────────

/// Extract the path from a `257 "/some/path" ...` reply.
pub fn parse_pwd(text: &str) -> FtpResult<String> {
    let start = text.find('"');
    if let Some(start) = start {
        if let Some(len) = text[start + 1..].find('"') {
            return Ok(text[start + 1..start + 1 + len].to_string());
        }
    }
    Err(FtpError::parse(format!("cannot parse PWD reply: {}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn unix_file() {
        let entries = parse("-rw-r--r--   1 user group  1234 Jan  1 12:00 readme.txt");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "readme.txt");
        assert_eq!(entries[0].kind, FileKind::File);
        assert_eq!(entries[0].size, 1234);
        assert_eq!(entries[0].owner.as_deref(), Some("user"));
    }

    #[test]
    fn unix_directory() {
        let entries = parse("drwxr-xr-x   2 root root  4096 Mar  1 09:30 subdir");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_directory());
    }

    #[test]
    fn unix_symlink_with_target() {
        let entries = parse("lrwxrwxrwx   1 root root    22 Jan  5 08:00 link -> /var/target");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_symlink());
        assert_eq!(entries[0].name, "link");
        assert_eq!(entries[0].link_target.as_deref(), Some("/var/target"));
    }

    #[test]
    fn unix_name_with_spaces() {
        let entries = parse("-rw-r--r--   1 u g  10 Jan  1 12:00 my file.txt");
        assert_eq!(entries[0].name, "my file.txt");
    }

    #[test]
    fn unix_year_form() {
        let entries = parse("-rw-r--r--   1 u g  10 Jun  3  2024 old.log");
        let modified = entries[0].modified.unwrap();
        assert_eq!(modified.year(), 2024);
        assert_eq!(modified.month(), 6);
        assert_eq!(modified.day(), 3);
    }

    #[test]
    fn mlsd_file() {
        let entries = parse("type=file;size=1024;modify=20260101120000; example.bin");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "example.bin");
        assert_eq!(entries[0].kind, FileKind::File);
        assert_eq!(entries[0].size, 1024);
        let modified = entries[0].modified.unwrap();
        assert_eq!(modified.hour(), 12);
    }

    #[test]
    fn mlsd_filters_dot_entries() {
        let raw = "type=cdir;; .\ntype=pdir;; ..\ntype=file;size=10;; real.txt";
        let entries = parse(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "real.txt");
    }

    #[test]
    fn windows_directory() {
        let entries = parse("01-01-26  12:00AM      <DIR> My Documents");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_directory());
        assert_eq!(entries[0].name, "My Documents");
    }

    #[test]
    fn windows_file() {
        let entries = parse("03-15-26  02:30PM       9000 report.pdf");
        assert_eq!(entries[0].kind, FileKind::File);
        assert_eq!(entries[0].size, 9000);
    }

    #[test]
    fn unknown_line_falls_back_to_name() {
        let entries = parse("completely unparseable junk");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "completely unparseable junk");
        assert_eq!(entries[0].kind, FileKind::Unknown);
    }

    #[test]
    fn mlsx_date_with_fraction() {
        let parsed = parse_mlsx_date("20260101120000.123").unwrap();
        assert_eq!(parsed.year(), 2026);
        assert_eq!(parsed.second(), 0);
    }

    #[test]
    fn mlsx_date_rejects_garbage() {
        assert!(parse_mlsx_date("not-a-date").is_err());
        assert!(parse_mlsx_date("2026").is_err());
    }

    #[test]
    fn pwd_quoted_path() {
        assert_eq!(
            parse_pwd("257 \"/home/user\" is current directory.").unwrap(),
            "/home/user"
        );
    }

    #[test]
    fn pwd_malformed_is_parse_error() {
        let err = parse_pwd("257 bad").unwrap_err();
        assert_eq!(err.kind, crate::ftp::error::FtpErrorKind::Parse);
    }
}
