/// Line based text writer with indentation tracking.
#[derive(Default)]
pub struct CodeBuilder {
  tab_level: usize,
  code: String,
}

impl CodeBuilder {
  pub fn write_ln(&mut self, content: impl AsRef<str>) -> &mut Self {
    let content = content.as_ref();
    if !content.is_empty() {
      for _ in 0..self.tab_level {
        self.code.push_str("  ");
      }
      self.code.push_str(content);
    }
    self.code.push('\n');
    self
  }

  /// Appends multi line text, indenting every non empty line.
  pub fn write_raw(&mut self, content: impl AsRef<str>) -> &mut Self {
    for line in content.as_ref().lines() {
      self.write_ln(line);
    }
    self
  }

  pub fn tab(&mut self) -> &mut Self {
    self.tab_level += 1;
    self
  }

  pub fn un_tab(&mut self) -> &mut Self {
    self.tab_level = self.tab_level.saturating_sub(1);
    self
  }

  pub fn output(self) -> String {
    self.code
  }
}
