/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data. Every mutator touching an input of a
 * cached artifact clears that cache in the same call, so the next save
 * persists the edit and the invalidation together.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who can see a song variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only the owner
    Private,
    /// The owner's unit
    Unit,
    /// Waiting for approval to become public
    Waiting,
    /// Everyone
    Public,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Private => write!(f, "private"),
            Visibility::Unit => write!(f, "unit"),
            Visibility::Waiting => write!(f, "waiting"),
            Visibility::Public => write!(f, "public"),
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(Visibility::Private),
            "unit" => Ok(Visibility::Unit),
            "waiting" => Ok(Visibility::Waiting),
            "public" => Ok(Visibility::Public),
            _ => Err(anyhow::anyhow!("Invalid visibility: {}", s)),
        }
    }
}

/// Paper size and orientation of a songbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaperFormat {
    #[default]
    A4,
    A5,
    A4Wide,
    A5Wide,
}

impl PaperFormat {
    /// Document class options for this format
    pub fn class_options(&self) -> &'static str {
        match self {
            PaperFormat::A4 => "a4paper",
            PaperFormat::A5 => "a5paper",
            PaperFormat::A4Wide => "a4paper, landscape",
            PaperFormat::A5Wide => "a5paper, landscape",
        }
    }
}

/// Where the song index is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexPlacement {
    Front,
    #[default]
    Back,
    Off,
}

/// Whether chords are printed above the lyrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChordMode {
    #[default]
    Chorded,
    LyricsOnly,
}

impl ChordMode {
    /// Songs package option for this mode
    pub fn package_option(&self) -> &'static str {
        match self {
            ChordMode::Chorded => "chorded",
            ChordMode::LyricsOnly => "lyric",
        }
    }
}

/// Layout options of a songbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongbookOptions {
    #[serde(default)]
    pub format: PaperFormat,
    #[serde(default = "default_columns")]
    pub columns: u8,
    #[serde(default)]
    pub index: IndexPlacement,
    #[serde(default)]
    pub chords: ChordMode,
    #[serde(default = "default_true")]
    pub page_numbering: bool,
    #[serde(default)]
    pub song_numbering: bool,
}

fn default_columns() -> u8 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for SongbookOptions {
    fn default() -> Self {
        Self {
            format: PaperFormat::default(),
            columns: default_columns(),
            index: IndexPlacement::default(),
            chords: ChordMode::default(),
            page_numbering: true,
            song_numbering: false,
        }
    }
}

/// Song record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongRecord {
    /// Unique song identifier (UUID)
    pub id: String,
    /// Song title
    pub title: String,
    /// Names of the interpreters
    pub interpreters: Vec<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

impl SongRecord {
    /// Create a new song record
    pub fn new(id: String, title: String, interpreters: Vec<String>) -> Self {
        Self {
            id,
            title,
            interpreters,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// One arrangement of a song, holding the markup and its fragment cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Unique variant identifier (UUID)
    pub id: String,
    /// Song this variant belongs to
    pub song_id: String,
    /// Owning user
    pub owner: String,
    /// Variant title
    pub title: String,
    /// Markup text
    pub text: String,
    /// Free-form description
    pub description: String,
    /// Visibility status
    pub visibility: Visibility,
    /// Translated fragment, present only after a clean translation
    pub cached_fragment: Option<String>,
    /// Bumped by every content edit; cache writes are tied to the revision they were built from
    #[serde(default)]
    pub revision: i64,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

/// Partial update of a variant; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct VariantUpdate {
    pub title: Option<String>,
    pub text: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
}

impl VariantUpdate {
    /// Whether the update touches anything
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.text.is_none()
            && self.description.is_none()
            && self.visibility.is_none()
    }
}

impl VariantRecord {
    /// Create a new variant record with an empty fragment cache
    pub fn new(
        id: String,
        song_id: String,
        owner: String,
        title: String,
        text: String,
        description: String,
        visibility: Visibility,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id,
            song_id,
            owner,
            title,
            text,
            description,
            visibility,
            cached_fragment: None,
            revision: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply an update and invalidate the fragment cache; returns whether anything was applied
    pub fn apply_update(&mut self, update: VariantUpdate) -> bool {
        if update.is_empty() {
            return false;
        }

        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(text) = update.text {
            self.text = text;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(visibility) = update.visibility {
            self.visibility = visibility;
        }

        self.invalidate_fragment_cache();
        self.revision += 1;
        self.updated_at = Utc::now().to_rfc3339();
        true
    }

    /// Drop the cached fragment
    pub fn invalidate_fragment_cache(&mut self) {
        self.cached_fragment = None;
    }
}

/// A song placed in a songbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongbookEntry {
    pub song_id: String,
    pub variant_id: String,
    /// Position in the songbook, ascending
    #[serde(default)]
    pub order: i64,
}

/// Songbook record with its publish cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongbookRecord {
    /// Unique songbook identifier (UUID)
    pub id: String,
    /// Songbook title
    pub title: String,
    /// Owning user
    pub owner: String,
    /// Layout options
    pub options: SongbookOptions,
    /// Songs in stored order, at most one variant per song
    pub entries: Vec<SongbookEntry>,
    /// Path of the last published document
    pub artifact_path: Option<String>,
    /// When the published document stops being reused
    pub cache_expires_at: Option<DateTime<Utc>>,
    /// Bumped by every title, options or membership change
    #[serde(default)]
    pub revision: i64,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

/// Partial update of a songbook; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct SongbookUpdate {
    pub title: Option<String>,
    pub options: Option<SongbookOptions>,
}

impl SongbookRecord {
    /// Create a new, empty songbook
    pub fn new(id: String, title: String, owner: String, options: SongbookOptions) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id,
            title,
            owner,
            options,
            entries: Vec::new(),
            artifact_path: None,
            cache_expires_at: None,
            revision: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply an update and invalidate the publish cache; returns whether anything was applied
    pub fn apply_update(&mut self, update: SongbookUpdate) -> bool {
        if update.title.is_none() && update.options.is_none() {
            return false;
        }

        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(options) = update.options {
            self.options = options;
        }

        self.touch();
        true
    }

    /// Place a variant of a song, replacing any other variant of the same song
    pub fn set_entry(&mut self, song_id: &str, variant_id: &str, order: i64) {
        let entry = SongbookEntry {
            song_id: song_id.to_string(),
            variant_id: variant_id.to_string(),
            order,
        };

        match self.entries.iter_mut().find(|e| e.song_id == song_id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }

        self.touch();
    }

    /// Remove the entry placing a variant; returns whether it was present
    pub fn remove_entry(&mut self, variant_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.variant_id != variant_id);

        if self.entries.len() == before {
            return false;
        }

        self.touch();
        true
    }

    /// Entries in compile order: ascending `order`, ties in insertion order
    pub fn ordered_entries(&self) -> Vec<&SongbookEntry> {
        let mut entries: Vec<&SongbookEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.order);
        entries
    }

    /// Drop the publish cache pointer
    pub fn invalidate_publish_cache(&mut self) {
        self.artifact_path = None;
        self.cache_expires_at = None;
    }

    /// Whether a cache pointer is set but past its expiration
    pub fn is_cache_expired(&self, now: DateTime<Utc>) -> bool {
        match (&self.artifact_path, self.cache_expires_at) {
            (Some(_), Some(expires_at)) => expires_at <= now,
            (Some(_), None) => true,
            _ => false,
        }
    }

    fn touch(&mut self) {
        self.invalidate_publish_cache();
        self.revision += 1;
        self.updated_at = Utc::now().to_rfc3339();
    }
}
