/// Pixel rectangle the photo quad is drawn into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn full(surface: (u32, u32)) -> Self {
        Self {
            x: 0,
            y: 0,
            width: surface.0 as i32,
            height: surface.1 as i32,
        }
    }
}

/// Fits an image into a surface while preserving its aspect ratio.
///
/// An image that fits in both dimensions is centred at native size. Otherwise
/// the dimension that overflows proportionally more is scaled to the surface
/// edge and the other one is centred. Sizes truncate toward zero.
pub fn fit_viewport(image: (u32, u32), surface: (u32, u32)) -> Viewport {
    let (image_w, image_h) = (image.0.max(1) as f64, image.1.max(1) as f64);
    let (surface_w, surface_h) = (surface.0 as i32, surface.1 as i32);
    let width_scale = image_w / surface.0.max(1) as f64;
    let height_scale = image_h / surface.1.max(1) as f64;
    let ratio = image_w / image_h;

    if width_scale <= 1.0 && height_scale <= 1.0 {
        let (width, height) = (image_w as i32, image_h as i32);
        return Viewport {
            x: (surface_w - width) / 2,
            y: (surface_h - height) / 2,
            width,
            height,
        };
    }

    if width_scale >= height_scale {
        let height = (surface_w as f64 / ratio) as i32;
        Viewport {
            x: 0,
            y: (surface_h - height) / 2,
            width: surface_w,
            height,
        }
    } else {
        let width = (surface_h as f64 * ratio) as i32;
        Viewport {
            x: (surface_w - width) / 2,
            y: 0,
            width,
            height: surface_h,
        }
    }
}
