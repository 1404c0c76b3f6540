//! Generates the DAV: multistatus XML returned to the client for
//! PROPFIND requests. Grounded on the teacher's
//! `webdav_adapter.rs::generate_propfind_response`/`write_resource_properties`,
//! extended to cover every property spec §3 lists.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use crate::error::{ProxyError, ProxyResult};
use crate::models::ResourceMeta;
use crate::path_util;

/// Renders a full multistatus document for one directory listing (or a
/// single file) as `(client_href, meta)` pairs. `mount_path` is prefixed
/// onto each canonical path to form the client-visible href.
pub fn render_multistatus(entries: &[(String, ResourceMeta)], mount_path: &str) -> ProxyResult<String> {
    let mut buf = Vec::new();
    let mut writer = Writer::new(&mut buf);

    let mut multistatus = BytesStart::new("D:multistatus");
    multistatus.push_attribute(("xmlns:D", "DAV:"));
    writer
        .write_event(Event::Start(multistatus))
        .map_err(xml_err)?;

    for (path, meta) in entries {
        write_response(&mut writer, mount_path, path, meta)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("D:multistatus")))
        .map_err(xml_err)?;

    String::from_utf8(buf).map_err(|e| ProxyError::ParseXml(e.to_string()))
}

fn write_response<W: std::io::Write>(
    writer: &mut Writer<W>,
    mount_path: &str,
    path: &str,
    meta: &ResourceMeta,
) -> ProxyResult<()> {
    writer
        .write_event(Event::Start(BytesStart::new("D:response")))
        .map_err(xml_err)?;

    let href = format!("{}{}", mount_path.trim_end_matches('/'), path_util::encode_path(path));
    write_text_element(writer, "D:href", &href)?;

    writer
        .write_event(Event::Start(BytesStart::new("D:propstat")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("D:prop")))
        .map_err(xml_err)?;

    // resourcetype
    if meta.is_collection {
        writer
            .write_event(Event::Start(BytesStart::new("D:resourcetype")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Empty(BytesStart::new("D:collection")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("D:resourcetype")))
            .map_err(xml_err)?;
    } else {
        writer
            .write_event(Event::Empty(BytesStart::new("D:resourcetype")))
            .map_err(xml_err)?;
        write_text_element(writer, "D:getcontentlength", &meta.content_length.to_string())?;
        write_text_element(writer, "D:getcontenttype", meta.content_type_or_default())?;
    }

    write_text_element(writer, "D:displayname", &meta.display_name)?;

    if let Some(etag) = &meta.etag {
        write_text_element(writer, "D:getetag", &format!("\"{etag}\""))?;
    }
    if let Some(ts) = meta.creation_date {
        if let Some(dt) = DateTime::<Utc>::from_timestamp(ts, 0) {
            write_text_element(writer, "D:creationdate", &dt.to_rfc3339())?;
        }
    }
    if let Some(ts) = meta.last_modified {
        if let Some(dt) = DateTime::<Utc>::from_timestamp(ts, 0) {
            write_text_element(writer, "D:getlastmodified", &dt.to_rfc2822())?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("D:prop")))
        .map_err(xml_err)?;
    write_text_element(writer, "D:status", "HTTP/1.1 200 OK")?;
    writer
        .write_event(Event::End(BytesEnd::new("D:propstat")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("D:response")))
        .map_err(xml_err)?;

    Ok(())
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> ProxyResult<()> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(xml_err)?;
    Ok(())
}

fn xml_err(e: quick_xml::Error) -> ProxyError {
    ProxyError::ParseXml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_file_and_directory_entries() {
        let dir = ResourceMeta {
            is_collection: true,
            content_length: 0,
            content_type: None,
            display_name: "a".into(),
            etag: None,
            creation_date: None,
            last_modified: None,
            split_info: None,
        };
        let file = ResourceMeta {
            is_collection: false,
            content_length: 42,
            content_type: Some("text/plain".into()),
            display_name: "f.txt".into(),
            etag: Some("abc".into()),
            creation_date: None,
            last_modified: None,
            split_info: None,
        };
        let xml = render_multistatus(
            &[("/a/".to_string(), dir), ("/a/f.txt".to_string(), file)],
            "/dav/",
        )
        .unwrap();
        assert!(xml.contains("<D:multistatus"));
        assert!(xml.contains("/dav/a/"));
        assert!(xml.contains("<D:collection/>"));
        assert!(xml.contains("42"));
        assert!(xml.contains("\"abc\""));
    }
}
