//! Fenced code block detection over a streaming markdown buffer.
//!
//! The detector is a pure function of the buffer: it is re-run on the whole
//! accumulated message after every delta and never keeps state of its own.
//! When a message holds several blocks the last one wins, and a block whose
//! closing fence has not arrived yet is returned with whatever content has
//! streamed so far.

/// Blocks must be strictly longer than this (in chars) to be committed.
pub const MIN_BLOCK_LEN: usize = 10;

const MIN_FENCE_LEN: usize = 3;
const MAX_FENCE_INDENT: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExtractedBlock {
    content: String,
    valid: bool,
}

impl ExtractedBlock {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let valid = is_valid_block(&content);
        Self { content, valid }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Crude guard against committing prose or half-streamed fragments.
pub fn is_valid_block(content: &str) -> bool {
    content.contains('\n') && content.chars().count() > MIN_BLOCK_LEN
}

/// Returns the last fenced block in `buffer`, or an empty invalid block when
/// there is none.
pub fn detect(buffer: &str) -> ExtractedBlock {
    detect_fence(buffer).unwrap_or_default()
}

/// Like [`detect`], but `None` when the buffer contains no opening fence at all.
///
/// Fences nested under a list item may be indented up to the item's content
/// column plus the usual three spaces; their content lines lose the fence's
/// indentation.
pub fn detect_fence(buffer: &str) -> Option<ExtractedBlock> {
    let mut last = None;
    let mut open: Option<(Fence, usize)> = None;
    let mut list_column: Option<usize> = None;
    let mut after_blank = false;

    for line in lines(buffer) {
        if let Some((fence, content_start)) = open {
            if fence.closes(line.text) {
                last = Some(fence.block(&buffer[content_start..line.start]));
                open = None;
            }
            continue;
        }

        let blank = line.text.trim().is_empty();
        // A blank line followed by a dedented one ends the list.
        if list_column.is_some_and(|column| after_blank && !blank && indent_of(line.text) < column) {
            list_column = None;
        }
        after_blank = blank;

        let fence = match list_item_column(line.text) {
            Some(column) => {
                list_column = Some(column);
                Fence::opening(&line.text[column..], column, column)
            }
            None => {
                let indent = indent_of(line.text);
                Fence::opening(&line.text[indent..], indent, list_column.unwrap_or(0))
            }
        };
        let Some(fence) = fence else {
            continue;
        };
        if !line.terminated {
            // Info string still streaming; no content yet.
            return Some(ExtractedBlock::default());
        }
        open = Some((fence, line.end + 1));
    }

    if let Some((fence, content_start)) = open {
        let mut content_end = buffer.len();
        if let Some(tail) = lines(buffer).last() {
            if !tail.terminated && tail.start >= content_start && fence.could_close(tail.text) {
                content_end = tail.start;
            }
        }
        last = Some(fence.block(&buffer[content_start..content_end]));
    }

    last
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
    /// Columns of leading space before the opening marker.
    indent: usize,
    /// Content column of the enclosing list item, 0 at top level.
    base: usize,
}

impl Fence {
    /// `rest` is the line with its `indent` leading columns removed.
    fn opening(rest: &str, indent: usize, base: usize) -> Option<Self> {
        if indent > base + MAX_FENCE_INDENT {
            return None;
        }
        let marker = rest.chars().next()?;
        if marker != '`' && marker != '~' {
            return None;
        }
        let len = run_length(rest, marker);
        if len < MIN_FENCE_LEN {
            return None;
        }
        // Backticks inside the info string mean inline code, not a fence.
        if marker == '`' && rest[len..].contains('`') {
            return None;
        }
        Some(Self {
            marker,
            len,
            indent,
            base,
        })
    }

    fn closes(&self, line: &str) -> bool {
        let Some(rest) = self.strip_indent(line) else {
            return false;
        };
        let len = run_length(rest, self.marker);
        len >= self.len && rest[len..].trim().is_empty()
    }

    /// A partial last line that may still grow into this fence's closer.
    fn could_close(&self, line: &str) -> bool {
        self.strip_indent(line)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c == self.marker))
    }

    fn strip_indent<'a>(&self, line: &'a str) -> Option<&'a str> {
        let indent = indent_of(line);
        (indent <= self.base + MAX_FENCE_INDENT).then(|| &line[indent..])
    }

    fn block(&self, content: &str) -> ExtractedBlock {
        if self.indent == 0 {
            return ExtractedBlock::new(content);
        }
        let dedented: String = content
            .split_inclusive('\n')
            .map(|line| &line[indent_of(line).min(self.indent)..])
            .collect();
        ExtractedBlock::new(dedented)
    }
}

// Fence markers are ASCII, so the char count doubles as a byte offset.
fn run_length(text: &str, marker: char) -> usize {
    text.chars().take_while(|c| *c == marker).count()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Column where the content of a list item starts, when `line` opens one
/// (`- `, `* `, `+ `, `1. ` or `1) `).
fn list_item_column(line: &str) -> Option<usize> {
    let indent = indent_of(line);
    let rest = &line[indent..];
    let marker_len = if rest.starts_with(|c: char| matches!(c, '-' | '*' | '+')) {
        1
    } else {
        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || digits > 9 || !rest[digits..].starts_with(|c: char| matches!(c, '.' | ')')) {
            return None;
        }
        digits + 1
    };
    let spaces = indent_of(&rest[marker_len..]);
    match spaces {
        0 => None,
        // Wider gaps start indented code inside the item.
        1..=4 => Some(indent + marker_len + spaces),
        _ => Some(indent + marker_len + 1),
    }
}

struct Line<'a> {
    text: &'a str,
    start: usize,
    end: usize,
    terminated: bool,
}

fn lines(buffer: &str) -> impl Iterator<Item = Line<'_>> {
    let mut start = 0;
    std::iter::from_fn(move || {
        if start >= buffer.len() {
            return None;
        }
        let rest = &buffer[start..];
        let line = match rest.find('\n') {
            Some(offset) => Line {
                text: &rest[..offset],
                start,
                end: start + offset,
                terminated: true,
            },
            None => Line {
                text: rest,
                start,
                end: buffer.len(),
                terminated: false,
            },
        };
        start = line.end + 1;
        Some(line)
    })
}
