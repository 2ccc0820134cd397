use std::borrow::Cow;

fn split_at_str<'a>(input: &'a str, needle: &str) -> Option<(&'a str, &'a str)> {
    let end = input.find(needle)?;
    let (head, tail) = input.split_at(end);
    Some((head, &tail[needle.len()..]))
}

// splits at the first run of whitespace; attrs in the registry are spread over
// spaces, tabs and newlines alike.
fn split_at_whitespace(input: &str) -> (&str, &str) {
    match input.find(|c: char| c.is_whitespace()) {
        Some(end) => (&input[..end], input[end..].trim_start()),
        None => (input, ""),
    }
}

// position of the `>` that closes the tag at the start of input. quoted attr
// values may contain `>` so quotes must be tracked.
fn find_tag_end(input: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if q == c => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

#[test]
fn test_find_tag_end() {
    assert_eq!(find_tag_end(r#"<a b="x>y">"#), Some(10));
    assert_eq!(find_tag_end(r#"<a b='"'>"#), Some(8));
    assert_eq!(find_tag_end(r#"<a b="x"#), None);
}

fn strip_decl(input: &str) -> Option<&str> {
    if !input.trim_start().starts_with("<?xml") {
        return None;
    }
    split_at_str(input, "?>").map(|(_, tail)| tail.trim_start())
}

#[test]
fn test_strip_decl() {
    const WITH_DECL: &str = r#"
<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<registry>
"#;
    assert!(strip_decl(WITH_DECL).unwrap().starts_with("<registry>"));

    const WITHOUT_DECL: &str = r#"
<registry>
"#;
    assert_eq!(strip_decl(WITHOUT_DECL), None);
}

/// Decodes the predefined entities and numeric character references. Borrows
/// when there is nothing to decode, which is the common case.
pub fn unescape(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some((head, tail)) = split_at_str(rest, "&") {
        out.push_str(head);
        let decoded = split_at_str(tail, ";").and_then(|(entity, after)| {
            let c = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, after))
        });
        match decoded {
            Some((c, after)) => {
                out.push(c);
                rest = after;
            }
            None => {
                // not an entity; keep the ampersand as-is.
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

#[test]
fn test_unescape() {
    assert!(matches!(unescape("plain"), Cow::Borrowed("plain")));
    assert_eq!(unescape("a &lt;&lt; 22U"), "a << 22U");
    assert_eq!(unescape("&quot;x&quot; &amp; &#65;&#x42;"), "\"x\" & AB");
    assert_eq!(unescape("a & b"), "a & b");
}

#[derive(Debug, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

pub struct AttributeIterator<'a> {
    attrs: &'a str,
}

impl<'a> AttributeIterator<'a> {
    pub fn new(attrs: &'a str) -> Self {
        Self { attrs }
    }
}

impl<'a> Iterator for AttributeIterator<'a> {
    type Item = Attribute<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, rest) = split_at_str(self.attrs, "=")?;
        let rest = rest.trim_start();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let (value, rest) = split_at_str(&rest[1..], if quote == '"' { "\"" } else { "'" })?;
        self.attrs = rest.trim_start();
        Some(Attribute {
            key: key.trim(),
            value,
        })
    }
}

#[test]
fn test_attribute_iterator() {
    const ATTRS: &str = "name=\"VK_KHR_swapchain\"\n        number = '2'\ttype=\"device\"";
    let mut iterator = AttributeIterator::new(ATTRS);
    assert_eq!(
        iterator.next(),
        Some(Attribute {
            key: "name",
            value: "VK_KHR_swapchain"
        })
    );
    assert_eq!(
        iterator.next(),
        Some(Attribute {
            key: "number",
            value: "2"
        })
    );
    assert_eq!(
        iterator.next(),
        Some(Attribute {
            key: "type",
            value: "device"
        })
    );
    assert_eq!(iterator.next(), None);
}

#[derive(Debug, PartialEq, Eq)]
pub struct EmptyTag<'a> {
    pub name: &'a str,
    pub attrs: &'a str,
}

impl<'a> EmptyTag<'a> {
    pub fn iter_attrs(&self) -> AttributeIterator<'a> {
        AttributeIterator::new(self.attrs)
    }

    pub fn attr(&self, key: &str) -> Option<&'a str> {
        self.iter_attrs()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StartTag<'a> {
    pub name: &'a str,
    pub attrs: &'a str,
}

impl<'a> StartTag<'a> {
    pub fn iter_attrs(&self) -> AttributeIterator<'a> {
        AttributeIterator::new(self.attrs)
    }

    pub fn attr(&self, key: &str) -> Option<&'a str> {
        self.iter_attrs()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct EndTag<'a> {
    pub name: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Element<'a> {
    EmptyTag(EmptyTag<'a>),
    StartTag(StartTag<'a>),
    EndTag(EndTag<'a>),
    Text(&'a str),
    Comment(&'a str),
}

pub struct ElementIterator<'a> {
    input: &'a str,
}

impl<'a> ElementIterator<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: strip_decl(input).unwrap_or(input),
        }
    }

    fn next_tag(&mut self) -> Option<Element<'a>> {
        assert!(self.input.starts_with("<"));

        let end = find_tag_end(self.input)?;
        let content = &self.input[1..end];
        self.input = &self.input[end + 1..];

        if let Some(name) = content.strip_prefix("/") {
            return Some(Element::EndTag(EndTag { name: name.trim() }));
        }
        if let Some(content) = content.strip_suffix("/") {
            let (name, attrs) = split_at_whitespace(content);
            return Some(Element::EmptyTag(EmptyTag {
                name,
                attrs: attrs.trim_end(),
            }));
        }
        let (name, attrs) = split_at_whitespace(content);
        Some(Element::StartTag(StartTag {
            name,
            attrs: attrs.trim_end(),
        }))
    }

    // <!DOCTYPE ...> and <?pi ...?> carry nothing the callers want.
    fn skip_markup_decl(&mut self) -> Option<()> {
        assert!(self.input.starts_with("<!") || self.input.starts_with("<?"));

        let end = find_tag_end(self.input)?;
        self.input = &self.input[end + 1..];
        Some(())
    }

    fn next_text(&mut self) -> Option<Element<'a>> {
        assert!(!self.input.starts_with("<"));
        assert!(!self.input.is_empty());

        if let Some(end) = self.input.find("<") {
            let content = &self.input[..end];
            self.input = &self.input[end..];
            Some(Element::Text(content))
        } else {
            let ret = Some(Element::Text(self.input));
            self.input = "";
            ret
        }
    }

    fn next_comment(&mut self) -> Option<Element<'a>> {
        assert!(self.input.starts_with("<!--"));

        let (content, rest) = split_at_str(&self.input[4..], "-->")?;
        self.input = rest;
        Some(Element::Comment(content))
    }
}

#[test]
fn test_next_empty_tag() {
    const INPUT: &str = r#"
<command name="vkCreateInstance"/>
"#;
    assert_eq!(
        ElementIterator::new(INPUT.trim()).next_tag(),
        Some(Element::EmptyTag(EmptyTag {
            name: "command",
            attrs: r#"name="vkCreateInstance""#
        }))
    );
}

#[test]
fn test_next_end_tag() {
    const INPUT: &str = r#"
</registry>
"#;
    assert_eq!(
        ElementIterator::new(INPUT.trim()).next_tag(),
        Some(Element::EndTag(EndTag { name: "registry" }))
    );
}

#[test]
fn test_next_start_tag() {
    const INPUT: &str = r#"
<feature api="vulkan,vulkansc"
         name="VK_VERSION_1_0" number="1.0" comment="a -> b">
"#;
    assert_eq!(
        ElementIterator::new(INPUT.trim()).next_tag(),
        Some(Element::StartTag(StartTag {
            name: "feature",
            attrs: "api=\"vulkan,vulkansc\"\n         name=\"VK_VERSION_1_0\" number=\"1.0\" comment=\"a -> b\""
        }))
    );
}

#[test]
fn test_next_text() {
    const INPUT: &str = r#"
    text
"#;
    assert_eq!(
        ElementIterator::new(INPUT.trim()).next_text(),
        Some(Element::Text("text"))
    );
}

#[test]
fn test_next_comment() {
    const INPUT: &str = r#"
<!-- SECTION: Vulkan command definitions -->
"#;
    assert_eq!(
        ElementIterator::new(INPUT.trim()).next_comment(),
        Some(Element::Comment(" SECTION: Vulkan command definitions ")),
    );
}

#[test]
fn test_skips_doctype() {
    let mut iterator = ElementIterator::new("<!DOCTYPE registry><registry/>");
    assert_eq!(
        iterator.next(),
        Some(Element::EmptyTag(EmptyTag {
            name: "registry",
            attrs: ""
        }))
    );
    assert_eq!(iterator.next(), None);
}

impl<'a> Iterator for ElementIterator<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.input.is_empty() {
                return None;
            } else if self.input.starts_with("<!--") {
                return self.next_comment();
            } else if self.input.starts_with("<!") || self.input.starts_with("<?") {
                self.skip_markup_decl()?;
            } else if self.input.starts_with("<") {
                return self.next_tag();
            } else {
                return self.next_text();
            }
        }
    }
}
