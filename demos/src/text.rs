//! String workloads, registered in the `text` library

use phasebench::constants::RESULT_VALUE_X;
use phasebench::prelude::*;
use std::hint::black_box;

/// Append `size` characters to a reused buffer
#[driver(library = "text")]
#[derive(Default)]
pub struct Append {
    buffer: String,
    size: usize,
}

impl BenchmarkDriver for Append {
    fn prepare(&mut self, test_case: &TestCase) -> anyhow::Result<()> {
        self.size = test_case.params().get_int("size")?.max(0) as usize;
        self.buffer = String::with_capacity(self.size);
        Ok(())
    }

    fn run(&mut self, _test_case: &TestCase) -> anyhow::Result<()> {
        self.buffer.clear();
        for _ in 0..self.size {
            self.buffer.push('x');
        }
        black_box(&self.buffer);
        Ok(())
    }
}

/// Split a generated sentence into words.
///
/// Reports the word count of the last iteration as its secondary value.
#[driver(library = "text", class = "WordSplit")]
#[derive(Default)]
pub struct Split {
    sentence: String,
    words: usize,
}

impl BenchmarkDriver for Split {
    fn prepare(&mut self, test_case: &TestCase) -> anyhow::Result<()> {
        let size = test_case.params().get_int("size")?.max(1) as usize;
        self.sentence = (0..size).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        Ok(())
    }

    fn run(&mut self, _test_case: &TestCase) -> anyhow::Result<()> {
        self.words = black_box(self.sentence.split_whitespace().count());
        Ok(())
    }

    fn finish(&mut self, test_case: &TestCase) -> anyhow::Result<()> {
        test_case.params().set_value(RESULT_VALUE_X, self.words as f64);
        Ok(())
    }
}
