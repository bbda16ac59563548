use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

fn main() -> anyhow::Result<()> {
    let mut img = RgbImage::new(800, 600);

    // Gradient backdrop
    for y in 0..600 {
        for x in 0..800 {
            let r = (x * 120 / 800) as u8;
            let g = (y * 120 / 600) as u8;
            img.put_pixel(x, y, Rgb([r, g, 90]));
        }
    }

    // Plate: 220x48 white rectangle with a dark frame and glyph bars
    let (px, py) = (290, 380);
    draw_filled_rect_mut(&mut img, Rect::at(px, py).of_size(220, 48), Rgb([235, 235, 235]));
    draw_hollow_rect_mut(&mut img, Rect::at(px, py).of_size(220, 48), Rgb([30, 30, 30]));
    for i in 0..8 {
        let glyph = Rect::at(px + 16 + i * 25, py + 10).of_size(10, 28);
        draw_filled_rect_mut(&mut img, glyph, Rgb([25, 25, 25]));
    }

    img.save("test_plate.png")?;
    println!("Created test_plate.png (800x600 with a 220x48 plate)");
    Ok(())
}
