//! Parsing of `207 Multi-Status` replies to a PROPFIND

use minidom::Element;

use crate::error::DavError;
use crate::node::RemoteNode;
use crate::utils::{find_elem, find_elems, is_success_status_line};

/// The PROPFIND body that asks for everything a [`RemoteNode`] needs
pub static LISTING_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:">
       <d:prop>
           <d:resourcetype />
           <d:getlastmodified />
           <d:getcontentlength />
       </d:prop>
    </d:propfind>
"#;


/// Turn a multistatus XML document into the list of entries it describes, in document order
pub fn parse(text: &str) -> Result<Vec<RemoteNode>, DavError> {
    let root: Element = text.parse()
        .map_err(|err| DavError::decode(format!("invalid XML: {}", err)))?;
    if root.name() != "multistatus" {
        return Err(DavError::decode(format!("expected a <multistatus> root, got <{}>", root.name())));
    }

    find_elems(&root, "response")
        .into_iter()
        .map(parse_response)
        .collect()
}

fn parse_response(response: &Element) -> Result<RemoteNode, DavError> {
    // <href> is a direct child of <response>, not to be mixed up with hrefs nested in some properties
    let href = response.children()
        .find(|child| child.name() == "href")
        .map(|el| el.text())
        .ok_or_else(|| DavError::decode("a <response> has no <href>"))?;
    let href = href.trim().to_string();

    let mut is_collection = false;
    let mut last_modified = None;
    let mut content_length = None;

    for prop in successful_props(response) {
        if let Some(rt) = find_elem(prop, "resourcetype") {
            if rt.children().any(|c| c.name() == "collection") {
                is_collection = true;
            }
        }
        if let Some(lm) = find_elem(prop, "getlastmodified") {
            let text = lm.text();
            if text.trim().is_empty() == false {
                last_modified = Some(text.trim().to_string());
            }
        }
        if let Some(cl) = find_elem(prop, "getcontentlength") {
            match cl.text().trim().parse::<u64>() {
                Ok(len) => content_length = Some(len),
                Err(_) => log::debug!("Ignoring invalid content length for {}", href),
            }
        }
    }

    if href.ends_with('/') {
        is_collection = true;
    }

    Ok(RemoteNode::new(href, is_collection, last_modified, content_length))
}

/// The `<prop>` elements of the `<propstat>` blocks that are not failures (e.g. a `404` for unknown properties)
fn successful_props(response: &Element) -> Vec<&Element> {
    let propstats = find_elems(response, "propstat");
    if propstats.is_empty() {
        // Some servers skip the <propstat> wrapper altogether
        return find_elems(response, "prop");
    }

    propstats.into_iter()
        .filter(|ps| match find_elem(ps, "status") {
            None => true,
            Some(status) => is_success_status_line(&status.text()),
        })
        .filter_map(|ps| find_elem(ps, "prop"))
        .collect()
}
