//! Reading and writing of images and parameter files.

mod images;
pub use images::{
    read_color_image, read_depth_image, read_rgbd_image, write_color_image, write_depth_image,
    write_depth_preview, DepthEncoding,
};

mod params;
