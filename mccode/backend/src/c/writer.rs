use super::runtime::RuntimeEmbedder;
use mccode_ir::CodeBlock;
use mccode_utils::{Error, McResult};
use regex::Regex;
use std::{
    collections::HashSet,
    io::{self, Write},
    path::Path,
};

lazy_static::lazy_static! {
    /// A library request inside a code block.
    static ref LIBRARY: Regex =
        Regex::new(r#"^\s*%include\s+"([^"]+)""#).unwrap();
}

/// Quote `s` as the body of a C string literal.
pub fn c_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Line oriented writer for the generated program.
///
/// Besides plain text, it writes the code blocks of the instrument with
/// their `%include "lib"` requests expanded, and copies support files in
/// verbatim. Every file is copied at most once per generated program.
pub struct CWriter<'a> {
    out: Box<dyn Write + 'a>,
    runtime: &'a dyn RuntimeEmbedder,
    embedded: HashSet<String>,
}

impl<'a> CWriter<'a> {
    pub fn new(out: Box<dyn Write + 'a>, runtime: &'a dyn RuntimeEmbedder) -> Self {
        Self {
            out,
            runtime,
            embedded: HashSet::new(),
        }
    }

    /// Write the lines of `code`.
    pub fn code(&mut self, code: &CodeBlock) -> McResult<()> {
        for line in &code.lines {
            match LIBRARY.captures(line) {
                Some(cap) => self.library(&cap[1])?,
                None => writeln!(self, "{line}")?,
            }
        }
        Ok(())
    }

    /// Write the lines of `code` inside a `{ .. }` block. Nothing is written
    /// for an empty block.
    pub fn code_braced(&mut self, code: &CodeBlock) -> McResult<()> {
        if code.is_empty() {
            return Ok(());
        }
        writeln!(self, "{{")?;
        self.code(code)?;
        writeln!(self, "}}")?;
        Ok(())
    }

    /// Write `lines` as a sequence of C string literals, concatenated by the
    /// C compiler. An empty list is written as `""`.
    pub fn string_lines(&mut self, lines: &[String]) -> McResult<()> {
        if lines.is_empty() {
            writeln!(self, "\"\"")?;
        }
        for line in lines {
            writeln!(self, "\"{}\"", c_quote(line))?;
        }
        Ok(())
    }

    /// Expand `%include "name"`. A name without extension stands for the
    /// pair `name.h` and `name.c`.
    pub fn library(&mut self, name: &str) -> McResult<()> {
        let files = if Path::new(name).extension().is_some() {
            vec![name.to_string()]
        } else {
            vec![format!("{name}.h"), format!("{name}.c")]
        };
        for file in files {
            self.embed(&file).map_err(|err| {
                Error::invalid_file(format!(
                    "Cannot embed library file `{file}' requested by %include \"{name}\": {err}"
                ))
            })?;
        }
        Ok(())
    }

    /// Copy the support file `name` into the output, unless it was already
    /// copied.
    pub fn embed(&mut self, name: &str) -> io::Result<()> {
        writeln!(self, "/* embedding file \"{name}\" */")?;
        if self.embedded.contains(name) {
            return Ok(());
        }
        let text = self.runtime.read(name)?;
        log::debug!("Embedding file {name}");
        writeln!(self)?;
        for line in text.lines() {
            writeln!(self, "{line}")?;
        }
        writeln!(self, "/* End of file \"{name}\". */")?;
        writeln!(self)?;
        self.embedded.insert(name.to_string());
        Ok(())
    }

    /// Path under which the support file `name` is `#include`d.
    pub fn include_path(&self, name: &str) -> String {
        self.runtime.include_path(name)
    }

    /// Flush the output.
    pub fn finish(mut self) -> McResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

impl Write for CWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Files(HashMap<&'static str, &'static str>);

    impl RuntimeEmbedder for Files {
        fn read(&self, name: &str) -> io::Result<String> {
            self.0
                .get(name)
                .map(|s| s.to_string())
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn include_path(&self, name: &str) -> String {
            name.to_string()
        }
    }

    fn render(f: impl FnOnce(&mut CWriter) -> McResult<()>) -> McResult<String> {
        let files = Files(HashMap::from([
            ("read_table-lib.h", "int rt_h;"),
            ("read_table-lib.c", "int rt_c;"),
        ]));
        let mut buf = Vec::new();
        {
            let mut w = CWriter::new(Box::new(&mut buf), &files);
            f(&mut w)?;
            w.finish()?;
        }
        Ok(String::from_utf8(buf).unwrap())
    }

    #[test]
    fn libraries_are_embedded_once() {
        let code = CodeBlock::new(
            "a.comp".into(),
            1,
            vec![
                "%include \"read_table-lib\"".into(),
                "int x;".into(),
                "  %include \"read_table-lib\"".into(),
            ],
        );
        let out = render(|w| w.code(&code)).unwrap();
        assert_eq!(out.matches("int rt_h;").count(), 1);
        assert_eq!(out.matches("int rt_c;").count(), 1);
        assert_eq!(
            out.matches("/* embedding file \"read_table-lib.h\" */").count(),
            2
        );
        assert!(out.contains("int x;\n"));
    }

    #[test]
    fn missing_library_is_an_error() {
        let code =
            CodeBlock::new("a.comp".into(), 1, vec!["%include \"nope\"".into()]);
        let err = render(|w| w.code(&code)).unwrap_err();
        assert!(err.to_string().contains("nope.h"));
    }

    #[test]
    fn string_lines_are_quoted() {
        let out = render(|w| {
            w.string_lines(&["say \"hi\"".to_string()])?;
            w.string_lines(&[])
        })
        .unwrap();
        assert_eq!(out, "\"say \\\"hi\\\"\"\n\"\"\n");
    }
}
