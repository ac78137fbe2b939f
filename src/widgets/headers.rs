use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Cell, Row, Table, Widget},
};

use crate::tfs::Headers;

/// Header block of the loaded file as a name / type / value table.
pub struct HeadersTable<'a> {
    headers: &'a Headers,
    scroll: usize,
    header_bg: Color,
    key_fg: Color,
}

impl<'a> HeadersTable<'a> {
    pub fn new(headers: &'a Headers) -> Self {
        Self {
            headers,
            scroll: 0,
            header_bg: Color::Indexed(236),
            key_fg: Color::Cyan,
        }
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn colors(mut self, header_bg: Color, key_fg: Color) -> Self {
        self.header_bg = header_bg;
        self.key_fg = key_fg;
        self
    }
}

impl Widget for HeadersTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let name_width = self
            .headers
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0)
            .max(4) as u16;
        let rows = self.headers.iter().skip(self.scroll).map(|(name, value)| {
            Row::new(vec![
                Cell::from(name.to_string()).style(Style::default().fg(self.key_fg)),
                Cell::from(value.tfs_type().code()),
                Cell::from(value.to_string()),
            ])
        });
        let header = Row::new(vec!["Name", "Type", "Value"])
            .style(Style::default().bg(self.header_bg));
        Table::new(
            rows,
            [
                Constraint::Length(name_width),
                Constraint::Length(4),
                Constraint::Fill(1),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .title(format!(" Headers ({}) ", self.headers.len())),
        )
        .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_names_and_values() {
        let mut headers = Headers::new();
        headers.insert("TITLE", "x");
        headers.insert("Q1", 0.31);
        let area = Rect::new(0, 0, 30, 5);
        let mut buf = Buffer::empty(area);
        HeadersTable::new(&headers).render(area, &mut buf);
        let text: String = (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.contains("TITLE"), "{}", text);
        assert!(text.contains("0.31"), "{}", text);
        assert!(text.contains("%le"), "{}", text);
    }
}
