/*!
 * Tag grammar of the song markup language.
 *
 * Read-only tables shared by the tokenizer and the translator: the
 * recognized section tags, the repetition delimiters, the chord shape and
 * the typesetting commands every construct compiles to.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Opening delimiter of a repetition span
pub const REPETITION_START: &str = "|:";

/// Closing delimiter of a repetition span, optionally followed by a count
pub const REPETITION_END: &str = ":|";

/// Repeat count used when `:|` carries no number
pub const DEFAULT_REPEAT_COUNT: u32 = 1;

/// Tag opening an inline recitation span
pub const RECITATION_TAG: &str = "rec";

/// First characters that turn a bracket token into a chord
pub const CHORD_LETTERS: [char; 8] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];

/// Tags a document is allowed to start with.
///
/// Narrower than the full section set: `outro`, `bridge` and `intermezzo`
/// are valid sections but cannot open a song.
pub const LEADING_TAGS: [&str; 5] = ["[chorus]", "[verse]", "[intro]", "[rec]", "[solo]"];

/// Characters outside of this class make a document unacceptable
static FORBIDDEN_CHARACTER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[^\w \n\r.,:|?!+#"()\[\]'-]"#).expect("Invalid forbidden character regex")
});

/// Typesetting commands emitted by the translator
pub mod commands {
    pub const BEGIN_CHORUS: &str = "\\beginchorus ";
    pub const END_CHORUS: &str = "\\endchorus";
    pub const BEGIN_VERSE: &str = "\\beginverse ";
    pub const BEGIN_SPECIAL_VERSE: &str = "\\beginverse* ";
    pub const END_VERSE: &str = "\\endverse";
    pub const BEGIN_RECITATION: &str = "\\echo{";
    pub const END_RECITATION: &str = "}";
    pub const BEGIN_REPETITION: &str = "\\lrep ";

    /// Closing repetition command with its repeat count
    pub fn end_repetition(count: u32) -> String {
        format!("\\rrep{{{}}}", count)
    }
}

/// Kind of structural section a tag opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Chorus,
    Verse,
    Intro,
    Outro,
    Solo,
    Bridge,
    Intermezzo,
}

impl SectionKind {
    /// All section kinds in tag-table order
    pub const ALL: [SectionKind; 7] = [
        SectionKind::Chorus,
        SectionKind::Verse,
        SectionKind::Intro,
        SectionKind::Outro,
        SectionKind::Solo,
        SectionKind::Bridge,
        SectionKind::Intermezzo,
    ];

    /// Tag name as written between brackets
    pub fn tag_name(&self) -> &'static str {
        match self {
            Self::Chorus => "chorus",
            Self::Verse => "verse",
            Self::Intro => "intro",
            Self::Outro => "outro",
            Self::Solo => "solo",
            Self::Bridge => "bridge",
            Self::Intermezzo => "intermezzo",
        }
    }

    /// Look up a section by the text between the brackets, ignoring case
    pub fn from_tag_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag_name().eq_ignore_ascii_case(name))
    }

    /// Special sections are verse variants typeset without a verse number
    pub fn is_special(&self) -> bool {
        !matches!(self, Self::Chorus | Self::Verse)
    }

    /// Command that opens this section
    pub fn open_command(&self) -> &'static str {
        match self {
            Self::Chorus => commands::BEGIN_CHORUS,
            Self::Verse => commands::BEGIN_VERSE,
            _ => commands::BEGIN_SPECIAL_VERSE,
        }
    }
}

/// Whether the interior of a bracket token has the shape of a chord
pub fn is_chord(interior: &str) -> bool {
    interior
        .chars()
        .next()
        .is_some_and(|first| CHORD_LETTERS.contains(&first))
}

/// Whether the interior of a bracket token is the recitation tag
pub fn is_recitation(interior: &str) -> bool {
    interior.eq_ignore_ascii_case(RECITATION_TAG)
}

/// Whether the text contains any character outside the whitelist
pub fn contains_forbidden_characters(text: &str) -> bool {
    FORBIDDEN_CHARACTER_REGEX.is_match(text)
}

/// Whether the line opens with one of the tags a song may start with
pub fn starts_with_leading_tag(line: &str) -> bool {
    let lowered = line.to_lowercase();
    LEADING_TAGS.iter().any(|tag| lowered.starts_with(tag))
}

/// Escape free text (titles, interpreter names) for a typesetter argument.
///
/// Covers the translator's quote and percent rules plus every character the
/// typesetter treats as syntax. Brackets stay as they are: inside a braced
/// argument they are plain text, and `\[` would start a chord.
pub fn escape_plain_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\textbackslash{}"),
            '{' | '}' | '%' | '&' | '#' | '$' | '_' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '^' => escaped.push_str("\\^{}"),
            '~' => escaped.push_str("\\~{}"),
            '"' => escaped.push_str("''"),
            _ => escaped.push(c),
        }
    }

    escaped
}
