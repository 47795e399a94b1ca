//! The fixed OCR prompts, and the language table that selects between them.

use std::fmt;

use clap::ValueEnum;

/// The system message: act as an OCR specialist, return only the extracted
/// characters, no commentary, and keep line breaks and layout where possible.
pub const SYSTEM_PROMPT: &str = "あなたはOCR専門AIです。画像内の文字を正確に抽出してください。文字のみを返し、不要な説明文は含めないでください。改行やレイアウトは可能な限り維持してください。";

/// Languages the user can ask us to prioritize during recognition.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum Language {
    /// Detect the language automatically.
    #[default]
    Auto,

    /// Prioritize Japanese text.
    Japanese,

    /// Prioritize English text.
    English,
}

impl Language {
    /// Look up a language option by name. Unrecognized options fall back to
    /// automatic detection rather than failing.
    pub fn from_option_str(option: &str) -> Language {
        match option.to_ascii_lowercase().as_str() {
            "japanese" => Language::Japanese,
            "english" => Language::English,
            _ => Language::Auto,
        }
    }

    /// The user instruction sent for this language.
    pub fn instruction(self) -> &'static str {
        match self {
            Language::Auto => "この画像に含まれる文字をすべて正確に抽出してください。",
            Language::Japanese => {
                "この画像に含まれる日本語の文字をすべて正確に抽出してください。日本語を優先して認識してください。"
            }
            Language::English => {
                "Please extract all English text from this image accurately. Prioritize English text recognition."
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Auto => "auto",
            Language::Japanese => "japanese",
            Language::English => "english",
        };
        f.write_str(name)
    }
}

/// A fully assembled OCR prompt: the fixed system message, plus one user turn
/// carrying the instruction text and the inline image.
#[derive(Debug)]
pub struct OcrPrompt {
    /// The system message.
    pub system: &'static str,

    /// The user instruction for the selected language.
    pub instruction: &'static str,

    /// The image, as a `data:` URL.
    pub image_data_url: String,
}

impl OcrPrompt {
    /// Build the prompt for one submission.
    pub fn new(language: Language, image_data_url: String) -> OcrPrompt {
        OcrPrompt {
            system: SYSTEM_PROMPT,
            instruction: language.instruction(),
            image_data_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_match_the_fixed_table() {
        assert_eq!(
            Language::Auto.instruction(),
            "この画像に含まれる文字をすべて正確に抽出してください。"
        );
        assert_eq!(
            Language::Japanese.instruction(),
            "この画像に含まれる日本語の文字をすべて正確に抽出してください。日本語を優先して認識してください。"
        );
        assert_eq!(
            Language::English.instruction(),
            "Please extract all English text from this image accurately. Prioritize English text recognition."
        );
    }

    #[test]
    fn option_lookup_is_case_insensitive() {
        assert_eq!(Language::from_option_str("Japanese"), Language::Japanese);
        assert_eq!(Language::from_option_str("ENGLISH"), Language::English);
        assert_eq!(Language::from_option_str("auto"), Language::Auto);
    }

    #[test]
    fn unrecognized_options_fall_back_to_auto() {
        for option in ["", "klingon", "jp", "en-US", "日本語"] {
            assert_eq!(
                Language::from_option_str(option),
                Language::Auto,
                "option {option:?}"
            );
            assert_eq!(
                Language::from_option_str(option).instruction(),
                Language::Auto.instruction()
            );
        }
    }

    #[test]
    fn prompts_carry_the_selected_instruction_and_image() {
        let prompt = OcrPrompt::new(
            Language::English,
            "data:image/png;base64,AAAA".to_owned(),
        );
        assert_eq!(prompt.system, SYSTEM_PROMPT);
        assert_eq!(prompt.instruction, Language::English.instruction());
        assert_eq!(prompt.image_data_url, "data:image/png;base64,AAAA");
    }
}
