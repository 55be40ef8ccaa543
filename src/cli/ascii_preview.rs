use crate::core::detector::FaceBox;
use image::DynamicImage;
use std::io::{self, Write};
use crossterm::{
    terminal::{self, ClearType},
    cursor,
};

const ASCII_RAMP: &str = " .·:;+=xX#@";
const DEFAULT_WIDTH: usize = 80;
const DEFAULT_HEIGHT: usize = 30;

pub struct AsciiRenderer {
    width: usize,
    height: usize,
}

impl AsciiRenderer {
    pub fn new(width: Option<usize>, height: Option<usize>) -> Self {
        let (term_width, term_height) = terminal::size()
            .map(|(w, h)| (w as usize, h as usize))
            .unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));

        // Half resolution keeps redraws cheap
        Self::with_size(
            width.unwrap_or((term_width / 2).min(DEFAULT_WIDTH / 2)),
            height.unwrap_or((term_height.saturating_sub(5) / 2).min(DEFAULT_HEIGHT / 2)),
        )
    }

    pub fn with_size(width: usize, height: usize) -> Self {
        Self { width: width.max(1), height: height.max(1) }
    }

    /// Frame as ASCII art, the first face outlined and `status` on the last row.
    pub fn render_frame(&self, image: &DynamicImage, faces: &[FaceBox], status: &str) -> String {
        let mut grid = self.image_to_ascii(image);

        if let Some(face) = faces.first() {
            self.draw_face_box(&mut grid, face, image.width() as f32, image.height() as f32);
        }

        let status_row = self.height - 1;
        grid[status_row] = vec![' '; self.width];
        self.overlay_text(&mut grid, status, self.width / 2, status_row);

        self.grid_to_string(&grid)
    }

    fn image_to_ascii(&self, image: &DynamicImage) -> Vec<Vec<char>> {
        let mut grid = vec![vec![' '; self.width]; self.height];
        let ramp: Vec<char> = ASCII_RAMP.chars().collect();

        let gray = image.to_luma8();
        let (img_width, img_height) = gray.dimensions();

        for term_y in 0..self.height {
            for term_x in 0..self.width {
                let img_x = (term_x as f32 / self.width as f32 * img_width as f32) as u32;
                let img_y = (term_y as f32 / self.height as f32 * img_height as f32) as u32;

                if img_x < img_width && img_y < img_height {
                    let brightness = gray.get_pixel(img_x, img_y)[0] as usize;
                    grid[term_y][term_x] = ramp[brightness * (ramp.len() - 1) / 255];
                }
            }
        }

        grid
    }

    fn overlay_text(&self, grid: &mut [Vec<char>], text: &str, center_x: usize, y: usize) {
        if y >= self.height {
            return;
        }

        let start_x = center_x.saturating_sub(text.chars().count() / 2);
        for (i, ch) in text.chars().enumerate() {
            let x = start_x + i;
            if x < self.width {
                grid[y][x] = ch;
            }
        }
    }

    fn draw_face_box(&self, grid: &mut [Vec<char>], face: &FaceBox, img_width: f32, img_height: f32) {
        let scale = |v: f32, img: f32, cells: usize| (((v / img) * cells as f32).max(0.0) as usize).min(cells - 1);
        let x1 = scale(face.x1, img_width, self.width);
        let x2 = scale(face.x2, img_width, self.width);
        let y1 = scale(face.y1, img_height, self.height);
        let y2 = scale(face.y2, img_height, self.height);
        if x2 <= x1 || y2 <= y1 {
            return;
        }

        for x in x1 + 1..x2 {
            grid[y1][x] = '─';
            grid[y2][x] = '─';
        }
        for row in grid.iter_mut().take(y2).skip(y1 + 1) {
            row[x1] = '│';
            row[x2] = '│';
        }
        grid[y1][x1] = '┌';
        grid[y1][x2] = '┐';
        grid[y2][x1] = '└';
        grid[y2][x2] = '┘';
    }

    fn grid_to_string(&self, grid: &[Vec<char>]) -> String {
        grid.iter()
            .map(|row| row.iter().take(self.width).collect::<String>())
            .collect::<Vec<_>>()
            .join("\r\n") // raw mode needs the explicit carriage return
    }
}

pub fn clear_screen() -> io::Result<()> {
    crossterm::execute!(
        io::stdout(),
        terminal::Clear(ClearType::All),
        cursor::MoveTo(0, 0)
    )?;
    io::stdout().flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, GrayImage};

    #[test]
    fn renders_requested_dimensions() {
        let renderer = AsciiRenderer::with_size(10, 4);
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 8, Luma([255])));
        let out = renderer.render_frame(&image, &[], "ok");

        let rows: Vec<&str> = out.split("\r\n").collect();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.chars().count() == 10));
        assert_eq!(rows[0], "@@@@@@@@@@");
        assert_eq!(rows[3].trim(), "ok");
    }

    #[test]
    fn outlines_first_face() {
        let renderer = AsciiRenderer::with_size(10, 6);
        let image = DynamicImage::ImageLuma8(GrayImage::new(100, 60));
        let face = FaceBox { x1: 20.0, y1: 10.0, x2: 60.0, y2: 40.0, confidence: 0.9 };
        let out = renderer.render_frame(&image, &[face], "");

        let rows: Vec<Vec<char>> = out.split("\r\n").map(|r| r.chars().collect()).collect();
        assert_eq!(rows[1][2], '┌');
        assert_eq!(rows[1][6], '┐');
        assert_eq!(rows[4][2], '└');
        assert_eq!(rows[2][2], '│');
    }
}
