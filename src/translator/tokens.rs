/*!
 * Tokenizer for single lines of song markup.
 *
 * A line is split into plain text pieces and tag tokens. Tags are bracket
 * tokens (`[verse]`, `[Am7]`, ...) and the repetition delimiters `|:` and
 * `:|`, the latter optionally followed by a repeat count.
 */

use crate::grammar::{self, SectionKind, DEFAULT_REPEAT_COUNT, REPETITION_END, REPETITION_START};

/// A recognized tag token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag<'a> {
    /// `[chorus]`, `[verse]` or one of the special verse variants
    Section(SectionKind),
    /// `[rec]`
    Recitation,
    /// `|:`
    RepStart,
    /// `:|` with its repeat count
    RepEnd(u32),
    /// Chord token including its brackets
    Chord(&'a str),
    /// Any other bracket token, brackets included
    Unknown(&'a str),
}

/// A piece of a tokenized line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    Text(&'a str),
    Tag(Tag<'a>),
}

/// Iterator over the pieces of one line
pub struct Tokenizer<'a> {
    line: &'a str,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line, position: 0 }
    }

    /// Try to read a tag at the very start of `rest`, returning it with its byte length
    fn match_tag(rest: &'a str) -> Option<(Tag<'a>, usize)> {
        if rest.starts_with(REPETITION_START) {
            return Some((Tag::RepStart, REPETITION_START.len()));
        }

        if let Some(after) = rest.strip_prefix(REPETITION_END) {
            let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            let count = if digits == 0 {
                DEFAULT_REPEAT_COUNT
            } else {
                after[..digits].parse().unwrap_or(u32::MAX)
            };
            return Some((Tag::RepEnd(count), REPETITION_END.len() + digits));
        }

        if let Some(body) = rest.strip_prefix('[') {
            // Stop at the first character that settles the token, so a line
            // full of unclosed brackets is still scanned in linear time
            let stop = body.find(|c: char| c == ']' || c == '[' || c.is_whitespace())?;
            if stop == 0 || !body[stop..].starts_with(']') {
                return None;
            }

            let interior = &body[..stop];
            let token = &rest[..stop + 2];
            let tag = if let Some(kind) = SectionKind::from_tag_name(interior) {
                Tag::Section(kind)
            } else if grammar::is_recitation(interior) {
                Tag::Recitation
            } else if grammar::is_chord(interior) {
                Tag::Chord(token)
            } else {
                Tag::Unknown(token)
            };
            return Some((tag, token.len()));
        }

        None
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Piece<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.line.len() {
            return None;
        }

        let line: &'a str = self.line;
        let rest = &line[self.position..];
        if let Some((tag, length)) = Self::match_tag(rest) {
            self.position += length;
            return Some(Piece::Tag(tag));
        }

        // Plain text runs until the next position where a tag can start
        let end = rest
            .char_indices()
            .skip(1)
            .find(|&(offset, c)| matches!(c, '[' | '|' | ':') && Self::match_tag(&rest[offset..]).is_some())
            .map_or(rest.len(), |(offset, _)| offset);

        self.position += end;
        Some(Piece::Text(&rest[..end]))
    }
}
