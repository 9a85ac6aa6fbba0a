//! Definitions for tracking source position information of instrument and
//! component files.

use itertools::Itertools;
use std::{
    cmp,
    fmt::Write,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
/// Handle to a position in a [PositionTable]
/// The index refers to the index in the [PositionTable::indices] vector.
pub struct PosIdx(u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
/// Handle to a file in a [PositionTable]
/// The index refers to the index in the [PositionTable::files] vector.
pub struct FileIdx(u32);

/// A source file
struct File {
    /// Name of the file
    name: String,
    /// The source code of the file
    source: String,
}

struct PosData {
    /// The file in the program. The index refers to the index in the
    /// [PositionTable::files] vector.
    file: FileIdx,
    /// Start of the span
    start: usize,
    /// End of the span
    end: usize,
}

/// Source position information for every file read during a compilation.
pub struct PositionTable {
    /// The source files of the program
    files: Vec<File>,
    /// Mapping from indexes to position data
    indices: Vec<PosData>,
}

impl Default for PositionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionTable {
    /// The unknown position
    pub const UNKNOWN: PosIdx = PosIdx(0);

    /// Create a new position table where the first file and first position are unknown
    pub fn new() -> Self {
        let mut table = PositionTable {
            files: Vec::new(),
            indices: Vec::new(),
        };
        table.add_file("unknown".to_string(), "".to_string());
        let pos = table.add_pos(FileIdx(0), 0, 0);
        debug_assert!(pos == Self::UNKNOWN);
        table
    }

    /// Add a new file to the position table
    pub fn add_file(&mut self, name: String, source: String) -> FileIdx {
        let file = File { name, source };
        let file_idx = self.files.len();
        self.files.push(file);
        FileIdx(file_idx as u32)
    }

    /// Return a reference to the file with the given index
    fn get_file_data(&self, file: FileIdx) -> &File {
        &self.files[file.0 as usize]
    }

    pub fn get_source(&self, file: FileIdx) -> &str {
        &self.get_file_data(file).source
    }

    pub fn get_name(&self, file: FileIdx) -> &str {
        &self.get_file_data(file).name
    }

    /// Add a new position to the position table
    pub fn add_pos(
        &mut self,
        file: FileIdx,
        start: usize,
        end: usize,
    ) -> PosIdx {
        let pos = PosData { file, start, end };
        let pos_idx = self.indices.len();
        self.indices.push(pos);
        PosIdx(pos_idx as u32)
    }

    fn get_pos(&self, pos: PosIdx) -> &PosData {
        &self.indices[pos.0 as usize]
    }

    /// 1-based line number of the start of the position.
    pub fn line_of(&self, pos: PosIdx) -> usize {
        let pos_d = self.get_pos(pos);
        let source = self.get_source(pos_d.file);
        let end = cmp::min(pos_d.start, source.len());
        source.as_bytes()[..end]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1
    }
}

lazy_static::lazy_static! {
    static ref TABLE: RwLock<PositionTable> = RwLock::new(PositionTable::new());
}

/// The global position table.
///
/// Every file read by the compiler, including autoloaded component files, is
/// registered here so that positions stay valid for the whole session.
pub struct GlobalPositionTable;

impl GlobalPositionTable {
    /// Shared access to the global [PositionTable]
    pub fn read() -> RwLockReadGuard<'static, PositionTable> {
        TABLE.read().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Exclusive access to the global [PositionTable]
    pub fn write() -> RwLockWriteGuard<'static, PositionTable> {
        TABLE.write().unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn add_file(name: String, source: String) -> FileIdx {
        Self::write().add_file(name, source)
    }

    pub fn add_pos(file: FileIdx, start: usize, end: usize) -> GPosIdx {
        GPosIdx(Self::write().add_pos(file, start, end))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
/// A position index backed by the global [PositionTable]
pub struct GPosIdx(pub PosIdx);

impl Default for GPosIdx {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl GPosIdx {
    /// Symbol for the unknown position
    pub const UNKNOWN: GPosIdx = GPosIdx(PosIdx(0));

    /// Convert the position into an optional.
    /// Returns `None` if the position is the unknown position.
    pub fn into_option(self) -> Option<Self> {
        if self == Self::UNKNOWN {
            None
        } else {
            Some(self)
        }
    }

    /// Returns the
    /// 1. lines associated with this span
    /// 2. start position of the first line in span
    /// 3. line number of the span
    fn get_lines(&self, table: &PositionTable) -> (Vec<String>, usize, usize) {
        let pos_d = table.get_pos(self.0);
        let file = table.get_source(pos_d.file);

        let lines = file.split('\n').collect_vec();
        let mut pos: usize = 0;
        let mut linum: usize = 1;
        let mut collect_lines = false;
        let mut buf = Vec::new();

        let mut out_line: usize = 0;
        let mut out_idx: usize = 0;
        for l in lines {
            let next_pos = pos + l.len();
            if pos_d.start >= pos && pos_d.start <= next_pos {
                out_line = linum;
                out_idx = pos;
                collect_lines = true;
            }
            if collect_lines && pos_d.end >= pos {
                buf.push(l.to_string())
            }
            if pos_d.end <= next_pos {
                break;
            }
            pos = next_pos + 1;
            linum += 1;
        }
        (buf, out_idx, out_line)
    }

    /// Format this position with a the error message `err_msg`
    pub fn format<S: AsRef<str>>(&self, err_msg: S) -> String {
        let table = GlobalPositionTable::read();
        let pos_d = table.get_pos(self.0);
        let name = table.get_name(pos_d.file);

        let (lines, pos, linum) = self.get_lines(&table);
        let mut buf = name.to_string();

        let Some(l) = lines.first() else {
            // Span outside of the recorded source, report the message alone.
            let _ = write!(buf, ": {}", err_msg.as_ref());
            return buf;
        };
        let linum_text = format!("{} ", linum);
        let linum_space: String = " ".repeat(linum_text.len());
        let offset = pos_d.start.saturating_sub(pos);
        let mark: String = "^".repeat(cmp::max(
            1,
            cmp::min(
                pos_d.end - pos_d.start,
                l.len().saturating_sub(offset),
            ),
        ));
        let space: String = " ".repeat(offset);
        let _ = writeln!(buf);
        let _ = writeln!(buf, "{}|{}", linum_text, l);
        let _ = write!(
            buf,
            "{}|{}{} {}",
            linum_space,
            space,
            mark,
            err_msg.as_ref()
        );
        buf
    }

    /// Name of the file this span belongs to.
    pub fn file_name(&self) -> String {
        let table = GlobalPositionTable::read();
        table.get_name(table.get_pos(self.0).file).to_string()
    }

    /// 1-based line at which this span starts. `0` for the unknown position.
    pub fn line(&self) -> usize {
        if *self == Self::UNKNOWN {
            return 0;
        }
        GlobalPositionTable::read().line_of(self.0)
    }
}

/// An IR node that may contain position information.
pub trait WithPos {
    /// Copy the span associated with this node.
    fn copy_span(&self) -> GPosIdx;
}

impl WithPos for GPosIdx {
    fn copy_span(&self) -> GPosIdx {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_numbers_and_caret() {
        let src = "DEFINE INSTRUMENT T()\nTRACE\nCOMPONENT a = Arm()\n";
        let file =
            GlobalPositionTable::add_file("t.instr".to_string(), src.into());
        let start = src.find("Arm").unwrap();
        let pos = GlobalPositionTable::add_pos(file, start, start + 3);
        assert_eq!(pos.line(), 3);
        assert_eq!(pos.file_name(), "t.instr");
        let msg = pos.format("unknown component");
        assert!(msg.starts_with("t.instr\n3 |COMPONENT a = Arm()"));
        assert!(msg.ends_with("^^^ unknown component"));
    }

    #[test]
    fn unknown_position() {
        assert_eq!(GPosIdx::UNKNOWN.line(), 0);
        assert!(GPosIdx::UNKNOWN.into_option().is_none());
    }
}
