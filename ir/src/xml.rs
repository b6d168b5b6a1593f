//! The XML subset used by IR documents: elements, attributes, text,
//! comments and processing instructions. No DTD, no CDATA, no namespaces.
use carve_core::internal::*;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_till1, take_until};
use nom::character::complete::{alpha1, alphanumeric1, char, multispace0, multispace1};
use nom::combinator::{all_consuming, map, map_res, recognize};
use nom::error::{ErrorKind, ParseError};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::{IResult, Parser};
use nom_language::error::VerboseError;

type R<'i, O> = IResult<&'i str, O, VerboseError<&'i str>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Element {
        Element { name: name.into(), ..Element::default() }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl ToString) -> Element {
        self.attributes.push((name.into(), value.to_string()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Element {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Element {
        self.text = text.into();
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| &**v)
    }

    pub fn required_attr(&self, name: &str) -> CarveResult<&str> {
        self.attr(name).with_context(|| format!("<{}> has no attribute {}", self.name, name))
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn required_child(&self, name: &str) -> CarveResult<&Element> {
        self.child(name).with_context(|| format!("<{}> has no <{}> child", self.name, name))
    }

    pub fn children_named<'e>(&'e self, name: &'e str) -> impl Iterator<Item = &'e Element> + 'e {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Write the element and its descendants, tab-indented.
    pub fn write(&self, w: &mut impl std::io::Write, depth: usize) -> std::io::Result<()> {
        let indent = "\t".repeat(depth);
        write!(w, "{}<{}", indent, self.name)?;
        for (k, v) in &self.attributes {
            write!(w, " {}=\"{}\"", k, escape(v))?;
        }
        if self.children.is_empty() && self.text.is_empty() {
            return writeln!(w, " />");
        }
        if self.children.is_empty() {
            return writeln!(w, ">{}</{}>", escape(&self.text), self.name);
        }
        writeln!(w, ">")?;
        for child in &self.children {
            child.write(w, depth + 1)?;
        }
        writeln!(w, "{}</{}>", indent, self.name)
    }
}

pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return s.into();
    }
    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped.into()
}

/// Decode the predefined entities and numeric character references.
pub fn unescape(s: &str) -> CarveResult<Cow<'_, str>> {
    if !s.contains('&') {
        return Ok(s.into());
    }
    let mut unescaped = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        unescaped.push_str(&rest[..amp]);
        let semi = rest[amp..].find(';').with_context(|| format!("Unterminated entity in {s:?}"))?;
        let entity = &rest[amp + 1..amp + semi];
        let c = match entity {
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            "amp" => '&',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or(entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .with_context(|| format!("Invalid entity &{entity}; in {s:?}"))?
            }
        };
        unescaped.push(c);
        rest = &rest[amp + semi + 1..];
    }
    unescaped.push_str(rest);
    Ok(unescaped.into())
}

pub fn parse_document(doc: &str) -> CarveResult<Element> {
    all_consuming(document)
        .parse(doc)
        .map(|pair| pair.1)
        .map_err(|e| format_err!("Failed to parse XML document: {:?}", e))
}

fn document(i: &str) -> R<'_, Element> {
    delimited(misc, element, misc).parse(i)
}

fn misc(i: &str) -> R<'_, ()> {
    map(many0(alt((multispace1, comment, processing_instruction))), |_| ()).parse(i)
}

fn comment(i: &str) -> R<'_, &str> {
    recognize((tag("<!--"), take_until("-->"), tag("-->"))).parse(i)
}

fn processing_instruction(i: &str) -> R<'_, &str> {
    recognize((tag("<?"), take_until("?>"), tag("?>"))).parse(i)
}

fn name(i: &str) -> R<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_"), tag("-"), tag("."), tag(":")))),
    ))
    .parse(i)
}

fn quoted(i: &str) -> R<'_, &str> {
    alt((
        delimited(char('"'), take_till(|c: char| c == '"'), char('"')),
        delimited(char('\''), take_till(|c: char| c == '\''), char('\'')),
    ))
    .parse(i)
}

fn attribute(i: &str) -> R<'_, (String, String)> {
    map_res(separated_pair(name, delimited(multispace0, char('='), multispace0), quoted), |(k, v)| {
        unescape(v).map(|v| (k.to_string(), v.into_owned()))
    })
    .parse(i)
}

fn closing<'i>(name: &'i str, i: &'i str) -> R<'i, ()> {
    map((tag("</"), tag(name), multispace0, char('>')), |_| ()).parse(i)
}

fn element(i: &str) -> R<'_, Element> {
    let (i, name) = preceded(char('<'), name).parse(i)?;
    let (i, attributes) = many0(preceded(multispace1, attribute)).parse(i)?;
    let (i, _) = multispace0::<_, VerboseError<&str>>(i)?;
    let mut el = Element { name: name.to_string(), attributes, ..Element::default() };
    if let Ok((i, _)) = tag::<_, _, VerboseError<&str>>("/>").parse(i) {
        return Ok((i, el));
    }
    let (mut i, _) = char::<_, VerboseError<&str>>('>').parse(i)?;
    let mut text = String::new();
    loop {
        if let Ok((rest, _)) = closing(name, i) {
            el.text = match unescape(text.trim()) {
                Ok(text) => text.into_owned(),
                Err(_) => {
                    return Err(nom::Err::Failure(VerboseError::from_error_kind(i, ErrorKind::Verify)));
                }
            };
            return Ok((rest, el));
        }
        if let Ok((rest, _)) = alt((comment, processing_instruction)).parse(i) {
            i = rest;
        } else if i.starts_with('<') {
            let (rest, child) = element(i)?;
            el.children.push(child);
            i = rest;
        } else {
            let (rest, t) = take_till1::<_, _, VerboseError<&str>>(|c: char| c == '<').parse(i)?;
            text.push_str(t);
            i = rest;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nested_document() {
        let doc = r#"<?xml version="1.0"?>
<!-- a comment -->
<net name="m" version="11">
    <layers>
        <layer id="0" name="a&amp;b" type='Parameter'>
            <data shape="1,4" element_type="f32"/>
            <output>
                <port id="0" precision="FP32"><dim>1</dim><dim>4</dim></port>
            </output>
        </layer>
    </layers>
    <edges/>
</net>
"#;
        let net = parse_document(doc).unwrap();
        assert_eq!(net.name, "net");
        assert_eq!(net.attr("version"), Some("11"));
        let layer = net.required_child("layers").unwrap().required_child("layer").unwrap();
        assert_eq!(layer.attr("name"), Some("a&b"));
        assert_eq!(layer.attr("type"), Some("Parameter"));
        let port = layer.required_child("output").unwrap().required_child("port").unwrap();
        let dims: Vec<&str> = port.children_named("dim").map(|d| &*d.text).collect();
        assert_eq!(dims, vec!["1", "4"]);
        assert!(net.child("edges").unwrap().children.is_empty());
    }

    #[test]
    fn written_documents_parse_back() {
        let doc = Element::new("net")
            .with_attr("name", "x<y")
            .with_child(Element::new("dim").with_text("-1"))
            .with_child(Element::new("empty"));
        let mut buffer = vec![];
        doc.write(&mut buffer, 0).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("name=\"x&lt;y\""));
        assert_eq!(parse_document(&text).unwrap(), doc);
    }

    #[test]
    fn unbalanced_document_fails() {
        assert!(parse_document("<net><layers></net>").is_err());
        assert!(parse_document("<net>").is_err());
        assert!(parse_document("<a/><b/>").is_err());
    }

    #[test]
    fn character_references() {
        assert_eq!(unescape("a&#44;b&#x2C;c&#X2c;d").unwrap(), "a,b,c,d");
        assert_eq!(unescape("line&#10;&amp;lt;").unwrap(), "line\n&lt;");
        let port = parse_document(r#"<port names="x&#44;y">&#x31;</port>"#).unwrap();
        assert_eq!(port.attr("names"), Some("x,y"));
        assert_eq!(port.text, "1");
    }

    #[test]
    fn bad_entities_are_refused() {
        assert!(unescape("&bogus;").is_err());
        assert!(unescape("&#xD800;").is_err());
        assert!(unescape("a & b").is_err());
        assert!(parse_document(r#"<port names="&#xZZ;"/>"#).is_err());
        assert!(parse_document("<dim>&nope;</dim>").is_err());
    }
}
