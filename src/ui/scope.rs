//! Oscilloscope widget for the output signal

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Widget},
};

/// Draws the min/max span of the samples falling in each column
pub struct Scope<'a> {
    samples: &'a [f32],
    gain: f32,
    style: Style,
    block: Option<Block<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(samples: &'a [f32]) -> Self {
        Self {
            samples,
            gain: 1.0,
            style: Style::default(),
            block: None,
        }
    }

    /// Vertical zoom applied before clipping to the widget height
    pub fn gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// (min, max) of the samples covered by column `x` of `width`
    fn column_span(&self, x: usize, width: usize) -> (f32, f32) {
        let len = self.samples.len();
        let start = x * len / width;
        let end = ((x + 1) * len / width).max(start + 1).min(len);

        self.samples[start.min(len - 1)..end]
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), s| {
                let s = s * self.gain;
                (lo.min(s), hi.max(s))
            })
    }

    fn render_scope(&self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.samples.is_empty() {
            return;
        }

        let width = area.width as usize;
        let half = (area.height as f32 - 1.0) / 2.0;
        let center = area.y as f32 + half;
        let bottom = area.y + area.height - 1;

        let row = |value: f32| -> u16 {
            let y = center - value.clamp(-1.0, 1.0) * half;
            (y.round() as u16).clamp(area.y, bottom)
        };

        let center_row = row(0.0);
        for x in area.x..area.x + area.width {
            buf.set_string(x, center_row, "─", Style::default());
        }

        for col in 0..width {
            let (lo, hi) = self.column_span(col, width);
            let (top, low) = (row(hi), row(lo));
            let x = area.x + col as u16;
            for y in top..=low {
                buf.set_string(x, y, "│", self.style);
            }
        }
    }
}

impl Widget for Scope<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = match &self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.clone().render(area, buf);
                inner
            }
            None => area,
        };

        self.render_scope(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(buf: &Buffer, x: u16, height: u16) -> Vec<String> {
        (0..height).map(|y| buf[(x, y)].symbol().to_string()).collect()
    }

    #[test]
    fn test_scope_empty() {
        let area = Rect::new(0, 0, 10, 5);
        let mut buf = Buffer::empty(area);
        Scope::new(&[]).render(area, &mut buf);
        assert_eq!(buf[(0, 2)].symbol(), " ");
    }

    #[test]
    fn test_silence_draws_center_line() {
        let samples = vec![0.0; 20];
        let area = Rect::new(0, 0, 10, 5);
        let mut buf = Buffer::empty(area);
        Scope::new(&samples).render(area, &mut buf);

        for x in 0..10 {
            assert_eq!(buf[(x, 0)].symbol(), " ");
            assert_eq!(buf[(x, 4)].symbol(), " ");
        }
    }

    #[test]
    fn test_full_scale_fills_column() {
        let samples = vec![1.0, -1.0];
        let area = Rect::new(0, 0, 1, 5);
        let mut buf = Buffer::empty(area);
        Scope::new(&samples).render(area, &mut buf);

        assert_eq!(column(&buf, 0, 5), vec!["│"; 5]);
    }

    #[test]
    fn test_positive_samples_draw_above_center() {
        let samples = vec![0.0, 1.0];
        let area = Rect::new(0, 0, 2, 5);
        let mut buf = Buffer::empty(area);
        Scope::new(&samples).render(area, &mut buf);

        assert_eq!(buf[(1, 0)].symbol(), "│");
        assert_eq!(buf[(1, 4)].symbol(), " ");
        assert_eq!(buf[(0, 0)].symbol(), " ");
    }

    #[test]
    fn test_gain_zooms_quiet_signal() {
        let samples = vec![0.1, -0.1];
        let area = Rect::new(0, 0, 1, 5);

        let mut plain = Buffer::empty(area);
        Scope::new(&samples).render(area, &mut plain);
        assert_eq!(plain[(0, 0)].symbol(), " ");

        let mut zoomed = Buffer::empty(area);
        Scope::new(&samples).gain(10.0).render(area, &mut zoomed);
        assert_eq!(column(&zoomed, 0, 5), vec!["│"; 5]);
    }

    #[test]
    fn test_more_columns_than_samples() {
        let samples = vec![0.5; 3];
        let area = Rect::new(0, 0, 20, 6);
        let mut buf = Buffer::empty(area);
        Scope::new(&samples)
            .block(Block::default().title("Scope"))
            .render(area, &mut buf);
    }
}
