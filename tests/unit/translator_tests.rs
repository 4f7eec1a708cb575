/*!
 * Tests for the markup translator public API
 */

use zpevnik::translator::{translate, DiagnosticCode, MarkupTranslator, Translator, TranslatorConfig};

const FORBIDDEN_MESSAGE: &str = "Text contains forbidden characters.";

/// Texts with forbidden characters are reported once for the whole document
#[test]
fn test_translate_withForbiddenCharacters_shouldReportDocumentLevelError() {
    let texts = [
        "[Verse] I wanna be the very best$",
        "[Verse] Like no one ever was!^@",
        "[Verse] To catch them is my * real test",
        "[Verse] To train <>them is my cause",
    ];

    for text in texts {
        let result = translate(text);
        assert_eq!(result.log(), FORBIDDEN_MESSAGE, "Unexpected log for {:?}", text);
        assert_eq!(result.count(DiagnosticCode::ForbiddenCharacters), 1);
    }
}

/// Text without an opening block is rejected
#[test]
fn test_translate_withoutOpeningBlock_shouldReportMissingBlock() {
    let result = translate("Toto je nas skautsky zpevnik");

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::MissingStartingBlock);
    assert!(result.diagnostics[0].is_document_level());
}

/// Well-formed songs translate without diagnostics
#[test]
fn test_translate_withCorrectSongs_shouldBeClean() {
    let songs = [
        "[verse]\nThe sky is a [Em]neighborhood, [B] [G] so keep it [A]down\n[C] The heart is a [Em]storybook, [A]a star burned out\nThe sky is a [Em]neighborhood, [B] [G] don't make a [A]sound\n\nThe sky is a [C]neighborhood, [Em] [A]don't look now\n",
        "[solo]\n[C] [Em] [Bb] [A]\n[G] [Gb] The [F]sky is a neighborhood",
        "[verse]\nStíny [E]dnů a snů se k obratníku [A]stáčí\nRuce [E]snů černejch se snaží zakrýt [A]oči\nSvětlo [F#mi]tvý prozradí proč já [E]vím\nS novým [F#mi]dnem že se [A]zas navrá[H]tí",
        "[Chorus]\n[E]Jenže tenhle zlej mě [A]strejda vyčítá,\n[G]že se mu to taky blbě [B]počítá.\nAle já [Emi]výlevy a provokace\nzavostalý generace [A]nevydejchám, [Ami]nevydejchám.",
    ];

    for song in songs {
        let result = translate(song);
        assert!(result.is_clean(), "Log found for {:?}:\n{}", song, result.log());
    }
}

/// Scenario: verse with a chord
#[test]
fn test_translate_verseWithChord_shouldEscapeChord() {
    let result = translate("[verse]\nHello [C]world\n");

    assert!(result.is_clean());
    assert!(result.fragment.contains("\\beginverse"));
    assert!(result.fragment.contains("\\[C]world"));
    assert!(result.fragment.ends_with("\\endverse"));
}

/// Scenario: nested repetition
#[test]
fn test_translate_nestedRepetition_shouldReportSecondOpen() {
    let result = translate("[verse] |: |: test :| :|");

    assert_eq!(result.count(DiagnosticCode::NestedRepetition), 1);
}

/// Scenario: chord inside recitation
#[test]
fn test_translate_chordInsideRecitation_shouldReportOnce() {
    let result = translate("[rec] test [A]");

    assert_eq!(result.count(DiagnosticCode::ChordInsideRec), 1);
}

/// Every special section opens a starred verse
#[test]
fn test_translate_specialSections_shouldOpenStarredVerse() {
    for tag in ["intro", "outro", "solo", "bridge", "intermezzo"] {
        let text = format!("[verse] a\n[{}] b", tag);
        let result = translate(&text);

        assert!(result.is_clean(), "{} should be clean: {}", tag, result.log());
        assert!(result.fragment.contains("\\beginverse* "), "{} should be starred", tag);
    }
}

/// The trait object and the free function agree
#[test]
fn test_translator_asTraitObject_shouldMatchFreeFunction() {
    let translator: Box<dyn MarkupTranslator> = Box::new(Translator::new(TranslatorConfig::default()));
    let text = "[chorus]\n|: La [D]la :|3\n[rec] spoken";

    assert_eq!(translator.translate(text), translate(text));
}
