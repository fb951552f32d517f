/*!
The configuration file writer.

Service configuration files like `/etc/heat/heat.conf` are INI documents that other programs
(and operators) also edit.  [`IniFile`] keeps every line it doesn't need to touch, including
comments, blank lines and key order, so a patch only changes the keys it names.

A [`ConfigPatch`] describes the desired edits to one file:

* `set` replaces a key's value, creating the section if needed;
* `add_to_list` treats the key's value as a comma separated set and adds an item to it.

A patch in `Merge` mode applies to the file's current content; in `Replace` mode it applies to an
empty document, for files owned entirely by the agent.  Writing goes through a temporary file and
a rename, and is skipped when the rendered file is byte-identical to what's on disk.
*/

use crate::error::{self, Result};
use crate::host;
use log::{debug, trace};
use snafu::{OptionExt, ResultExt};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DEFAULT_FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Entry {
        key: String,
        value: String,
        // The line as read, rendered back while the entry is untouched.
        raw: Option<String>,
        // Indented lines following the entry, which INI readers treat as part of its value.
        continuation: Vec<String>,
    },
    // Comments and blank lines, kept verbatim.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Section {
    name: String,
    lines: Vec<Line>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        // Later duplicates win, as they do for INI readers.
        self.lines.iter().rev().find_map(|line| match line {
            Line::Entry { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    fn set(&mut self, key: &str, new_value: &str) {
        let mut found = false;
        self.lines.retain_mut(|line| match line {
            Line::Entry {
                key: k,
                value,
                raw,
                continuation,
            } if k == key => {
                if found {
                    return false;
                }
                found = true;
                *value = new_value.to_string();
                *raw = None;
                continuation.clear();
                true
            }
            _ => true,
        });
        if found {
            return;
        }

        // New keys go after the last existing entry so they stay clear of trailing comments.
        let position = self
            .lines
            .iter()
            .rposition(|line| matches!(line, Line::Entry { .. }))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.lines.insert(
            position,
            Line::Entry {
                key: key.to_string(),
                value: new_value.to_string(),
                raw: None,
                continuation: Vec::new(),
            },
        );
    }
}

/// An INI document that preserves the content it doesn't manage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniFile {
    // Comments and blank lines before the first section.
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl IniFile {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reads the document at `path`.  A missing file gives an empty document.
    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(path, &text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("'{}' does not exist, starting empty", path.display());
                Ok(Self::new())
            }
            Err(e) => Err(e).context(error::IniReadSnafu { path }),
        }
    }

    /// Parses `text`; `path` is only used in error messages.
    pub fn parse<P>(path: P, text: &str) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let mut doc = Self::new();

        for (i, raw) in text.lines().enumerate() {
            let trimmed = raw.trim();
            let syntax_error = || error::IniSyntaxSnafu {
                path,
                line_number: i + 1,
                line: raw,
            };

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                match doc.sections.last_mut() {
                    Some(section) => section.lines.push(Line::Other(raw.to_string())),
                    None => doc.preamble.push(raw.to_string()),
                }
                continue;
            }

            if trimmed.starts_with('[') {
                let name = trimmed
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .with_context(syntax_error)?;
                doc.sections.push(Section::new(name));
                continue;
            }

            let section = doc.sections.last_mut().with_context(syntax_error)?;

            if raw.starts_with(|c: char| c.is_whitespace()) {
                if let Some(Line::Entry { continuation, .. }) = section.lines.last_mut() {
                    continuation.push(raw.to_string());
                    continue;
                }
            }

            let (key, value) = split_entry(trimmed).with_context(syntax_error)?;
            section.lines.push(Line::Entry {
                key: key.to_string(),
                value: value.to_string(),
                raw: Some(raw.to_string()),
                continuation: Vec::new(),
            });
        }

        trace!(
            "Parsed '{}' with {} sections",
            path.display(),
            doc.sections.len()
        );
        Ok(doc)
    }

    /// Returns the value of `key` in `section`.  When the section appears more than once, the
    /// last copy holding the key wins.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .rev()
            .filter(|s| s.name == section)
            .find_map(|s| s.get(key))
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.iter().any(|s| s.name == section)
    }

    /// Names of the sections, in file order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Sets `key` in `section` to `value`, replacing any previous value.  The edit goes to the
    /// copy of the section `get` reads from, or to its last copy if the key is new.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.section_mut(section, key).set(key, value);
    }

    /// Adds `item` to the comma separated set stored under `key`.  Existing items keep their
    /// order, empty items and duplicates are dropped, and an item already present isn't added
    /// again.
    pub fn add_to_list(&mut self, section: &str, key: &str, item: &str) {
        let mut items: Vec<String> = Vec::new();
        let existing = self.get(section, key).unwrap_or("");
        for candidate in existing.split(',').chain(std::iter::once(item)) {
            let candidate = candidate.trim();
            if !candidate.is_empty() && !items.iter().any(|i| i == candidate) {
                items.push(candidate.to_string());
            }
        }
        self.set(section, key, &items.join(","));
    }

    fn section_mut(&mut self, name: &str, key: &str) -> &mut Section {
        let holding_key = self
            .sections
            .iter()
            .rposition(|s| s.name == name && s.get(key).is_some());
        let last = || self.sections.iter().rposition(|s| s.name == name);
        let index = match holding_key.or_else(last) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }
}

// Splits at whichever of '=' or ':' comes first, as INI readers do.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let separator = line.find(|c| c == '=' || c == ':')?;
    let key = line[..separator].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, line[separator + 1..].trim()))
}

impl fmt::Display for IniFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.preamble {
            writeln!(f, "{}", line)?;
        }
        for (i, section) in self.sections.iter().enumerate() {
            // Keep sections visually apart when the previous one didn't end in a blank line.
            let previous_blank = i == 0
                || matches!(
                    self.sections[i - 1].lines.last(),
                    Some(Line::Other(l)) if l.trim().is_empty()
                );
            if !previous_blank {
                writeln!(f)?;
            }

            writeln!(f, "[{}]", section.name)?;
            for line in &section.lines {
                match line {
                    Line::Entry {
                        key,
                        value,
                        raw,
                        continuation,
                    } => {
                        if let Some(raw) = raw {
                            writeln!(f, "{}", raw)?;
                        } else if value.is_empty() {
                            writeln!(f, "{} =", key)?;
                        } else {
                            writeln!(f, "{} = {}", key, value)?;
                        }
                        for extra in continuation {
                            writeln!(f, "{}", extra)?;
                        }
                    }
                    Line::Other(text) => writeln!(f, "{}", text)?,
                }
            }
        }
        Ok(())
    }
}

/// One edit of a configuration file.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Set {
        section: String,
        key: String,
        value: String,
    },
    AddToList {
        section: String,
        key: String,
        item: String,
    },
}

/// Whether a patch applies to the file's current content or to an empty document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchMode {
    Merge,
    Replace,
}

/// A set of edits to one configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigPatch {
    pub path: PathBuf,
    pub mode: PatchMode,
    pub edits: Vec<Edit>,
}

impl ConfigPatch {
    /// A patch applied on top of the file's existing content.
    pub fn merge<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            mode: PatchMode::Merge,
            edits: Vec::new(),
        }
    }

    /// A patch that defines the whole file.
    pub fn replace<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            mode: PatchMode::Replace,
            edits: Vec::new(),
        }
    }

    pub fn set<S1, S2, S3>(mut self, section: S1, key: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        self.edits.push(Edit::Set {
            section: section.into(),
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Sets `key` only when there's a value for it.
    pub fn set_some<S1, S2, S3>(self, section: S1, key: S2, value: Option<S3>) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        match value {
            Some(value) => self.set(section, key, value),
            None => self,
        }
    }

    pub fn add_to_list<S1, S2, S3>(mut self, section: S1, key: S2, item: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        self.edits.push(Edit::AddToList {
            section: section.into(),
            key: key.into(),
            item: item.into(),
        });
        self
    }

    /// Applies the edits to `doc`.
    pub fn apply_to(&self, doc: &mut IniFile) {
        for edit in &self.edits {
            match edit {
                Edit::Set {
                    section,
                    key,
                    value,
                } => doc.set(section, key, value),
                Edit::AddToList { section, key, item } => doc.add_to_list(section, key, item),
            }
        }
    }

    /// Returns the document the patch would produce, without writing it.
    pub fn render(&self) -> Result<IniFile> {
        let mut doc = match self.mode {
            PatchMode::Merge => IniFile::load(&self.path)?,
            PatchMode::Replace => IniFile::new(),
        };
        self.apply_to(&mut doc);
        Ok(doc)
    }

    /// Applies the patch to the file on disk.  Returns whether the file changed.
    pub fn write(&self) -> Result<bool> {
        let rendered = self.render()?.to_string();
        match fs::read_to_string(&self.path) {
            Ok(current) if current == rendered => {
                debug!("'{}' is up to date", self.path.display());
                return Ok(false);
            }
            _ => {}
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                host::ensure_directory(parent)?;
            }
        }
        debug!("Writing '{}'", self.path.display());
        host::write_file_atomic(&self.path, rendered.as_bytes(), DEFAULT_FILE_MODE)?;
        Ok(true)
    }
}
