mod rgb;
pub use rgb::{ColorImage, IntoColorArray, IntoImageRgb8};

mod luma;
pub use luma::{rgb_to_luma, IntoLumaImage};

mod rgbd_image;
pub use rgbd_image::{
    is_valid_depth, RgbdImage, RgbdView, SensorFrame, FAR_CLIP, INVALID_DEPTH,
};
