/// Word-level timestamp shared by synthesis and recognition sentences.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Word {
    #[serde(default)]
    text: String,
    #[serde(default)]
    begin_time: u64,
    #[serde(default)]
    end_time: u64,
}

impl Word {
    pub fn new(text: &str, begin_time: u64, end_time: u64) -> Self {
        Self {
            text: text.to_string(),
            begin_time,
            end_time,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn begin_time(&self) -> u64 {
        self.begin_time
    }

    pub fn end_time(&self) -> u64 {
        self.end_time
    }
}

/// Per-sentence timing reported in `output.sentence` while synthesizing.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SynthesisSentence {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    words: Vec<Word>,
}

impl SynthesisSentence {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// End of the last word, in milliseconds from the start of the audio.
    pub fn end_time(&self) -> Option<u64> {
        self.words.last().map(Word::end_time)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SynthesisUsage {
    #[serde(default)]
    characters: u32,
}

impl SynthesisUsage {
    pub fn new(characters: u32) -> Self {
        Self { characters }
    }

    pub fn characters(&self) -> u32 {
        self.characters
    }
}
