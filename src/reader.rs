use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::errors::{Error, Result};

/// Lexical event produced by [`ElementReader::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    Start(String),
    End(String),
    Eof,
}

/// Forward-only cursor over the elements of a document.
///
/// Comments, processing instructions, declarations and text are skipped. A
/// self-closing element is reported as a start immediately followed by its
/// end.
pub trait ElementReader {
    fn advance(&mut self) -> Result<ReadEvent>;

    /// Value of an attribute on the element most recently started.
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Byte offset of the cursor, for error reports.
    fn position(&self) -> usize;
}

/// [`ElementReader`] backed by quick-xml.
pub struct XmlElementReader<R: BufRead> {
    inner: Reader<R>,
    buf: Vec<u8>,
    attributes: Vec<(String, String)>,
    depth: usize,
}

impl<R: BufRead> XmlElementReader<R> {
    pub fn new(source: R) -> Self {
        let mut inner = Reader::from_reader(source);
        inner.trim_text(true);
        inner.expand_empty_elements(true);

        XmlElementReader {
            inner,
            buf: Vec::new(),
            attributes: Vec::new(),
            depth: 0,
        }
    }

    fn malformed(&self, err: impl ToString) -> Error {
        Error::malformed(self.inner.buffer_position(), err.to_string())
    }

    fn decode_name(&self, name: &[u8]) -> Result<String> {
        self.inner
            .decoder()
            .decode(name)
            .map(|name| name.into_owned())
            .map_err(|err| self.malformed(err))
    }

    fn collect_attributes(&self, el: &BytesStart) -> Result<Vec<(String, String)>> {
        let mut attributes = Vec::new();
        for attribute_res in el.attributes() {
            let attribute = attribute_res.map_err(|err| self.malformed(err))?;
            let key = self.decode_name(attribute.key.local_name().as_ref())?;
            let value = attribute
                .decode_and_unescape_value(&self.inner)
                .map_err(|err| self.malformed(err))?;
            attributes.push((key, value.into_owned()));
        }
        Ok(attributes)
    }
}

/// Opens an OSM document for reading, decompressing `.xz` files on the fly.
/// The file is closed when the returned reader is dropped.
pub fn open_document(path: &Path) -> Result<XmlElementReader<Box<dyn BufRead>>> {
    let file = fs::File::open(path)?;
    let file_reader = BufReader::new(file);
    let source: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "xz") {
        Box::new(BufReader::new(XzDecoder::new(file_reader)))
    } else {
        Box::new(file_reader)
    };
    Ok(XmlElementReader::new(source))
}

impl<R: BufRead> ElementReader for XmlElementReader<R> {
    fn advance(&mut self) -> Result<ReadEvent> {
        loop {
            self.buf.clear();
            let event = match self
                .inner
                .read_event_into(&mut self.buf)
                .map(|event| event.into_owned())
            {
                Ok(event) => event,
                Err(err) => return Err(self.malformed(err)),
            };

            match event {
                Event::Start(el) => {
                    let name = self.decode_name(el.local_name().as_ref())?;
                    self.attributes = self.collect_attributes(&el)?;
                    self.depth += 1;
                    return Ok(ReadEvent::Start(name));
                }
                Event::End(el) => {
                    let name = self.decode_name(el.local_name().as_ref())?;
                    self.depth = self.depth.saturating_sub(1);
                    return Ok(ReadEvent::End(name));
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(self.malformed(format!(
                            "document ended with {} unclosed element(s)",
                            self.depth
                        )));
                    }
                    return Ok(ReadEvent::Eof);
                }
                // Never produced with expanded empty elements.
                Event::Empty(_) => (),
                Event::Text(_)
                | Event::CData(_)
                | Event::Comment(_)
                | Event::Decl(_)
                | Event::PI(_)
                | Event::DocType(_) => (),
            }
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn position(&self) -> usize {
        self.inner.buffer_position()
    }
}
