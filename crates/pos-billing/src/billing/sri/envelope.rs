//! Event walk over SOAP responses and voucher documents.

use quick_xml::events::Event;
use quick_xml::Reader;

/// Callback view of the document: element opened, text inside the current element, element
/// closed. `path` holds the local names from the root down to the current element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node<'a> {
    Open(&'a [String]),
    Text(&'a [String], &'a str),
    Close(&'a [String]),
}

#[derive(Debug, thiserror::Error)]
#[error("malformed XML at byte {position}: {message}")]
pub struct EnvelopeError {
    pub position: u64,
    pub message: String,
}

fn local(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

pub fn walk<F>(xml: &str, mut visit: F) -> Result<(), EnvelopeError>
where
    F: FnMut(Node<'_>),
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut path: Vec<String> = Vec::new();

    loop {
        let fail = |reader: &Reader<&[u8]>, message: String| EnvelopeError {
            position: reader.buffer_position() as u64,
            message,
        };
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                path.push(local(start.local_name().as_ref()));
                visit(Node::Open(&path));
            }
            Ok(Event::Empty(start)) => {
                path.push(local(start.local_name().as_ref()));
                visit(Node::Open(&path));
                visit(Node::Close(&path));
                path.pop();
            }
            Ok(Event::End(_)) => {
                visit(Node::Close(&path));
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|err| fail(&reader, err.to_string()))?;
                visit(Node::Text(&path, &value));
            }
            Ok(Event::CData(data)) => {
                let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                visit(Node::Text(&path, &value));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(fail(&reader, err.to_string())),
        }
    }
    Ok(())
}

/// Text of the first element named `name`, anywhere in the document.
pub fn first_text(xml: &str, name: &str) -> Result<Option<String>, EnvelopeError> {
    let mut found = None;
    walk(xml, |node| {
        if let Node::Text(path, text) = node {
            if found.is_none() && path.last().is_some_and(|last| last == name) {
                found = Some(text.to_string());
            }
        }
    })?;
    Ok(found)
}
