// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Office Open XML extraction (DOCX, PPTX, XLSX)

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};

use crate::{Result, SortdeskError};

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>> {
    Ok(zip::ZipArchive::new(Cursor::new(bytes))?)
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String> {
    let mut entry = archive.by_name(name)
        .map_err(|_| SortdeskError::Extraction(format!("No {} found", name)))?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Extract text from DOCX, one chunk per paragraph joined by spaces
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    Ok(docx_paragraphs(&xml)?.join(" "))
}

fn docx_paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Extract the text of every shape on every slide, slides in deck order
pub fn extract_pptx(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;

    let slides = match deck_order(&mut archive) {
        Ok(order) if !order.is_empty() => order,
        _ => numbered_slides(&archive),
    };

    let mut shapes = Vec::new();
    for name in slides {
        let xml = read_entry(&mut archive, &name)?;
        shapes.extend(slide_shapes(&xml)?);
    }

    Ok(shapes.join(" "))
}

/// Slide parts in the order `ppt/presentation.xml` lists them
fn deck_order(archive: &mut zip::ZipArchive<Cursor<&[u8]>>) -> Result<Vec<String>> {
    let presentation = read_entry(archive, "ppt/presentation.xml")?;
    let rels = read_entry(archive, "ppt/_rels/presentation.xml.rels")?;

    let targets: HashMap<String, String> = element_attributes(&rels, b"Relationship", &[b"Id", b"Target"])?
        .into_iter()
        .filter_map(|mut values| {
            let target = values.pop()??;
            let id = values.pop()??;
            Some((id, target))
        })
        .collect();

    let present: HashSet<&str> = archive.file_names().collect();
    let order = element_attributes(&presentation, b"p:sldId", &[b"r:id"])?
        .into_iter()
        .filter_map(|mut values| values.pop()?)
        .filter_map(|id| targets.get(&id))
        .map(|target| match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("ppt/{}", target),
        })
        .filter(|name| present.contains(name.as_str()))
        .collect();

    Ok(order)
}

/// `ppt/slides/slideN.xml` parts by N, for decks without a usable slide list
fn numbered_slides(archive: &zip::ZipArchive<Cursor<&[u8]>>) -> Vec<String> {
    let mut slides: Vec<(u32, String)> = archive.file_names()
        .filter_map(|name| {
            let number = name.strip_prefix("ppt/slides/slide")?.strip_suffix(".xml")?;
            number.parse().ok().map(|n| (n, name.to_string()))
        })
        .collect();
    slides.sort();
    slides.into_iter().map(|(_, name)| name).collect()
}

/// For every `element`, the values of `keys` in order (`None` when absent)
fn element_attributes(xml: &str, element: &[u8], keys: &[&[u8]]) -> Result<Vec<Vec<Option<String>>>> {
    let mut reader = Reader::from_str(xml);
    let mut found = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == element => {
                let mut values = vec![None; keys.len()];
                for attr in e.attributes().flatten() {
                    if let Some(i) = keys.iter().position(|k| *k == attr.key.as_ref()) {
                        values[i] = Some(attr.decode_and_unescape_value(&reader)?.into_owned());
                    }
                }
                found.push(values);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}

/// Text of each top-level text-bearing shape on a slide.
///
/// Grouped shapes are skipped; only shapes that own a text body contribute,
/// paragraphs joined by newlines.
fn slide_shapes(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut shapes = Vec::new();
    let mut group_depth = 0usize;
    let mut shape: Option<(bool, Vec<String>)> = None;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"p:grpSp" => group_depth += 1,
                b"p:sp" if group_depth == 0 => shape = Some((false, Vec::new())),
                b"p:txBody" => {
                    if let Some((has_text, _)) = shape.as_mut() {
                        *has_text = true;
                    }
                }
                b"a:p" => {
                    if let Some((_, paragraphs)) = shape.as_mut() {
                        paragraphs.push(String::new());
                    }
                }
                b"a:t" => in_text = true,
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(paragraph) = shape.as_mut().and_then(|(_, p)| p.last_mut()) {
                    paragraph.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"p:grpSp" => group_depth = group_depth.saturating_sub(1),
                b"a:t" => in_text = false,
                b"p:sp" if group_depth == 0 => {
                    if let Some((true, paragraphs)) = shape.take() {
                        shapes.push(paragraphs.join("\n"));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}

/// Extract every non-empty cell value of every sheet, row by row
pub fn extract_xlsx(bytes: &[u8]) -> Result<String> {
    use calamine::{Data, Reader as _, Xlsx};

    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| SortdeskError::Extraction(format!("Failed to open workbook: {}", e)))?;

    let mut cells = Vec::new();
    for sheet_name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&sheet_name)
            .map_err(|e| SortdeskError::Extraction(format!("Failed to read sheet {}: {}", sheet_name, e)))?;
        for row in range.rows() {
            for cell in row {
                match cell {
                    Data::Empty => {}
                    Data::String(s) if s.is_empty() => {}
                    other => cells.push(other.to_string()),
                }
            }
        }
    }

    Ok(cells.join(" "))
}
