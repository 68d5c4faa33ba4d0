//! Markup scanner for the headless document
//!
//! Understands start and end tags, quoted and bare attributes, text and
//! comments. Void elements never take children. Stray end tags are dropped
//! and elements still open at the end of input are closed there. Entities
//! are left as written.

/// Elements that never have children and serialize as `<tag ... />`
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// One parsed node
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum MarkupNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

struct OpenElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<MarkupNode>,
}

struct StartTag {
    tag: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    consumed: usize,
}

/// Parse `markup` into a forest of nodes
pub(crate) fn parse(markup: &str) -> Vec<MarkupNode> {
    let mut roots = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut text = String::new();
    let mut rest = markup;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            flush_text(&mut text, &mut stack, &mut roots);
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
            continue;
        }

        if let Some(after) = rest.strip_prefix("</") {
            if let Some(end) = after.find('>') {
                flush_text(&mut text, &mut stack, &mut roots);
                let name = after[..end].trim().to_ascii_lowercase();
                close_element(&name, &mut stack, &mut roots);
                rest = &after[end + 1..];
                continue;
            }
        }

        if let Some(start) = scan_start_tag(rest) {
            flush_text(&mut text, &mut stack, &mut roots);
            rest = &rest[start.consumed..];
            if start.self_closing || is_void(&start.tag) {
                push_node(
                    MarkupNode::Element {
                        tag: start.tag,
                        attrs: start.attrs,
                        children: Vec::new(),
                    },
                    &mut stack,
                    &mut roots,
                );
            } else {
                stack.push(OpenElement {
                    tag: start.tag,
                    attrs: start.attrs,
                    children: Vec::new(),
                });
            }
            continue;
        }

        // Plain text runs up to the next '<' after the current character
        let first = rest.chars().next().map_or(1, char::len_utf8);
        let next = rest[first..].find('<').map_or(rest.len(), |i| i + first);
        text.push_str(&rest[..next]);
        rest = &rest[next..];
    }

    flush_text(&mut text, &mut stack, &mut roots);
    while let Some(open) = stack.pop() {
        let node = MarkupNode::Element {
            tag: open.tag,
            attrs: open.attrs,
            children: open.children,
        };
        push_node(node, &mut stack, &mut roots);
    }
    roots
}

fn push_node(node: MarkupNode, stack: &mut [OpenElement], roots: &mut Vec<MarkupNode>) {
    match stack.last_mut() {
        Some(top) => top.children.push(node),
        None => roots.push(node),
    }
}

fn flush_text(text: &mut String, stack: &mut [OpenElement], roots: &mut Vec<MarkupNode>) {
    if !text.is_empty() {
        push_node(MarkupNode::Text(std::mem::take(text)), stack, roots);
    }
}

fn close_element(name: &str, stack: &mut Vec<OpenElement>, roots: &mut Vec<MarkupNode>) {
    if !stack.iter().any(|open| open.tag == name) {
        return;
    }
    while let Some(open) = stack.pop() {
        let matched = open.tag == name;
        let node = MarkupNode::Element {
            tag: open.tag,
            attrs: open.attrs,
            children: open.children,
        };
        push_node(node, stack, roots);
        if matched {
            break;
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

/// Scan `<tag attr="value" ...>` at the start of `input`
///
/// Returns `None` when `input` does not start with a complete start tag, in
/// which case the caller treats the `<` as text.
fn scan_start_tag(input: &str) -> Option<StartTag> {
    let bytes = input.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'<' || !bytes[1].is_ascii_alphabetic() {
        return None;
    }

    let mut pos = 1;
    while pos < bytes.len() && is_name_byte(bytes[pos]) {
        pos += 1;
    }
    let tag = input[1..pos].to_ascii_lowercase();
    let mut attrs = Vec::new();

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos)? {
            b'>' => {
                return Some(StartTag {
                    tag,
                    attrs,
                    self_closing: false,
                    consumed: pos + 1,
                });
            }
            b'/' => {
                if bytes.get(pos + 1) == Some(&b'>') {
                    return Some(StartTag {
                        tag,
                        attrs,
                        self_closing: true,
                        consumed: pos + 2,
                    });
                }
                pos += 1;
            }
            _ => {
                let name_start = pos;
                while pos < bytes.len()
                    && !bytes[pos].is_ascii_whitespace()
                    && !matches!(bytes[pos], b'=' | b'>' | b'/')
                {
                    pos += 1;
                }
                let name = input[name_start..pos].to_ascii_lowercase();

                while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                let value = if bytes.get(pos) == Some(&b'=') {
                    pos += 1;
                    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                        pos += 1;
                    }
                    match bytes.get(pos)? {
                        quote @ (b'"' | b'\'') => {
                            let value_start = pos + 1;
                            let len = input[value_start..].find(char::from(*quote))?;
                            pos = value_start + len + 1;
                            input[value_start..value_start + len].to_string()
                        }
                        _ => {
                            let value_start = pos;
                            while pos < bytes.len()
                                && !bytes[pos].is_ascii_whitespace()
                                && bytes[pos] != b'>'
                            {
                                pos += 1;
                            }
                            input[value_start..pos].to_string()
                        }
                    }
                } else {
                    String::new()
                };
                attrs.push((name, value));
            }
        }
    }
}

/// Escape a value for a double-quoted attribute
pub(crate) fn escape_attribute(value: &str) -> String {
    value.replace('"', "&quot;")
}
