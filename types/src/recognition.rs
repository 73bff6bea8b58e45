use crate::synthesis::Word;

/// `output.sentence` of a recognition `result-generated` event. Intermediate
/// results are re-sent with growing text until `sentence_end` is set.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecognitionSentence {
    #[serde(default)]
    begin_time: u64,
    #[serde(default)]
    end_time: Option<u64>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    sentence_end: bool,
    #[serde(default)]
    words: Vec<Word>,
}

impl RecognitionSentence {
    pub fn new(text: &str, begin_time: u64, end_time: Option<u64>) -> Self {
        Self {
            begin_time,
            end_time,
            text: text.to_string(),
            sentence_end: end_time.is_some(),
            words: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn begin_time(&self) -> u64 {
        self.begin_time
    }

    pub fn end_time(&self) -> Option<u64> {
        self.end_time
    }

    pub fn is_sentence_end(&self) -> bool {
        self.sentence_end
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }
}

/// Seconds of audio billed for the task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecognitionUsage {
    #[serde(default)]
    duration: u64,
}

impl RecognitionUsage {
    pub fn duration(&self) -> u64 {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_sentence_has_no_end() {
        let json = r#"{"begin_time":170,"end_time":null,"text":"hello wor","words":[]}"#;
        let sentence: RecognitionSentence = serde_json::from_str(json).unwrap();
        assert_eq!(sentence.end_time(), None);
        assert!(!sentence.is_sentence_end());

        let json = r#"{"begin_time":170,"end_time":920,"text":"hello world","sentence_end":true,
            "words":[{"text":"hello","begin_time":170,"end_time":500},{"text":"world","begin_time":500,"end_time":920}]}"#;
        let sentence: RecognitionSentence = serde_json::from_str(json).unwrap();
        assert_eq!(sentence.end_time(), Some(920));
        assert_eq!(sentence.words()[1].text(), "world");
    }
}
