use crate::bytecode::module::Id;
use crate::foundation::error::{GpuError, GpuResult};

pub(crate) type Word = u32;

/// Number of words in the module header (magic, version, generator, bound, schema).
pub(crate) const HEADER_WORDS: usize = 5;

/// Decode a byte buffer into words, normalizing big-endian modules by their magic.
pub(crate) fn words_from_bytes(bytes: &[u8]) -> GpuResult<Vec<Word>> {
    if bytes.len() % 4 != 0 {
        return Err(GpuError::malformed(format!(
            "byte length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    let mut words: Vec<Word> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    match words.first().copied() {
        Some(spirv::MAGIC_NUMBER) => {}
        Some(w) if w.swap_bytes() == spirv::MAGIC_NUMBER => {
            for w in &mut words {
                *w = w.swap_bytes();
            }
        }
        Some(w) => {
            return Err(GpuError::malformed(format!("bad magic number {w:#010x}")));
        }
        None => return Err(GpuError::malformed("empty module")),
    }
    Ok(words)
}

/// One encoded instruction: opcode plus its operand words (header excluded).
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawInstruction<'a> {
    pub(crate) opcode: u16,
    pub(crate) operands: &'a [Word],
}

/// Iterates the instruction stream that follows the header.
pub(crate) struct InstructionIter<'a> {
    words: &'a [Word],
    pos: usize,
}

impl<'a> InstructionIter<'a> {
    pub(crate) fn new(words: &'a [Word], pos: usize) -> Self {
        Self { words, pos }
    }
}

impl<'a> Iterator for InstructionIter<'a> {
    type Item = GpuResult<RawInstruction<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = *self.words.get(self.pos)?;
        let word_count = (header >> 16) as usize;
        let opcode = (header & 0xffff) as u16;
        if word_count == 0 {
            self.pos = self.words.len();
            return Some(Err(GpuError::malformed(format!(
                "zero word count for opcode {opcode} at word {}",
                self.pos
            ))));
        }
        let end = self.pos + word_count;
        if end > self.words.len() {
            let at = self.pos;
            self.pos = self.words.len();
            return Some(Err(GpuError::malformed(format!(
                "instruction at word {at} (opcode {opcode}) runs past end of module"
            ))));
        }
        let operands = &self.words[self.pos + 1..end];
        self.pos = end;
        Some(Ok(RawInstruction { opcode, operands }))
    }
}

/// Cursor over one instruction's operands. [`Operands::finish`] rejects trailing words.
pub(crate) struct Operands<'a> {
    op: spirv::Op,
    words: &'a [Word],
    pos: usize,
}

impl<'a> Operands<'a> {
    pub(crate) fn new(op: spirv::Op, words: &'a [Word]) -> Self {
        Self { op, words, pos: 0 }
    }

    pub(crate) fn word(&mut self) -> GpuResult<Word> {
        let w = self.words.get(self.pos).copied().ok_or_else(|| {
            GpuError::malformed(format!("Op{:?}: missing operand {}", self.op, self.pos))
        })?;
        self.pos += 1;
        Ok(w)
    }

    pub(crate) fn id(&mut self) -> GpuResult<Id> {
        self.word()
    }

    pub(crate) fn string(&mut self) -> GpuResult<String> {
        let mut bytes = Vec::new();
        loop {
            let chunk = self.word()?.to_le_bytes();
            match chunk.iter().position(|&b| b == 0) {
                Some(nul) => {
                    bytes.extend_from_slice(&chunk[..nul]);
                    break;
                }
                None => bytes.extend_from_slice(&chunk),
            }
        }
        String::from_utf8(bytes)
            .map_err(|_| GpuError::malformed(format!("Op{:?}: string is not utf-8", self.op)))
    }

    /// Consume every remaining operand word.
    pub(crate) fn rest(&mut self) -> &'a [Word] {
        let rest = &self.words[self.pos..];
        self.pos = self.words.len();
        rest
    }

    pub(crate) fn remaining(&self) -> usize {
        self.words.len() - self.pos
    }

    pub(crate) fn finish(self) -> GpuResult<()> {
        if self.pos != self.words.len() {
            return Err(GpuError::malformed(format!(
                "Op{:?}: {} trailing operand word(s)",
                self.op,
                self.words.len() - self.pos
            )));
        }
        Ok(())
    }
}

/// Encode a nul-terminated, word-padded literal string.
pub(crate) fn encode_string(s: &str) -> Vec<Word> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/bytecode/words.rs"]
mod tests;
