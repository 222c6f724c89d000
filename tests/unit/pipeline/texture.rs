use super::*;

fn extent(w: u32, h: u32) -> Extent {
    Extent::new(w, h).unwrap()
}

#[test]
fn nearest_sampling_floors_and_clamps_to_black() {
    let mut tex = Texture::new(extent(2, 2), TextureFormat::Rgba8Unorm);
    tex.write(1, 0, Rgba([1.0, 0.0, 0.0, 1.0]));
    tex.write(0, 1, Rgba([0.0, 1.0, 0.0, 1.0]));

    assert_eq!(tex.sample_nearest([0.75, 0.25]), Rgba([1.0, 0.0, 0.0, 1.0]));
    assert_eq!(tex.sample_nearest([0.5, 0.0]), Rgba([1.0, 0.0, 0.0, 1.0]));
    assert_eq!(tex.sample_nearest([0.49, 0.99]), Rgba([0.0, 1.0, 0.0, 1.0]));
    assert_eq!(tex.sample_nearest([0.0, 0.0]), Rgba::TRANSPARENT);

    assert_eq!(tex.sample_nearest([1.0, 0.5]), Rgba::OPAQUE_BLACK);
    assert_eq!(tex.sample_nearest([-0.01, 0.5]), Rgba::OPAQUE_BLACK);
    assert_eq!(tex.sample_nearest([f32::NAN, 0.5]), Rgba::OPAQUE_BLACK);
}

#[test]
fn float_textures_keep_full_precision() {
    let mut tex = Texture::new(extent(1, 1), TextureFormat::Rgba32Float);
    assert_eq!(tex.data().len(), 16);
    tex.write(0, 0, Rgba([0.25, 2.0, -1.0, 0.1]));
    assert_eq!(tex.read(0, 0), Some(Rgba([0.25, 2.0, -1.0, 0.1])));
    assert_eq!(tex.read(1, 0), None);

    let img = tex.to_image().unwrap();
    assert_eq!(img.get_pixel(0, 0).0, [64, 255, 0, 26]);
}

#[test]
fn image_interop_round_trips_rgba8() {
    let img = image::RgbaImage::from_fn(3, 2, |x, y| image::Rgba([x as u8, y as u8, 9, 255]));
    let tex = Texture::from_image(&img).unwrap();
    assert_eq!(tex.extent(), extent(3, 2));
    assert_eq!(tex.to_image().unwrap(), img);
    assert!(Texture::from_rgba8(extent(2, 2), vec![0; 15]).is_err());
}

#[test]
fn solid_and_clear_fill_every_texel() {
    let mut tex = Texture::solid(extent(2, 1), TextureFormat::Rgba8Unorm, Rgba::OPAQUE_BLACK);
    assert_eq!(tex.data(), &[0, 0, 0, 255, 0, 0, 0, 255]);
    tex.clear(Rgba([1.0, 1.0, 1.0, 1.0]));
    assert!(tex.data().iter().all(|b| *b == 255));
    assert!(tex.upload(&[0; 7]).is_err());
}

#[test]
fn depth_stencil_clears_independently() {
    let mut ds = DepthStencilTexture::new(extent(2, 2));
    assert_eq!(ds.texel(1, 1), Some(DepthStencilTexel::default()));

    ds.clear(None, Some(3));
    assert_eq!(
        ds.texel(0, 0),
        Some(DepthStencilTexel {
            depth: 1.0,
            stencil: 3
        })
    );
    ds.clear(Some(0.0), None);
    ds.set_texel(1, 0, DepthStencilTexel {
        depth: 0.5,
        stencil: 9,
    });
    assert_eq!(ds.texel(0, 0).unwrap().stencil, 3);
    assert_eq!(ds.texel(1, 0).unwrap().depth, 0.5);
    assert_eq!(ds.texel(2, 0), None);

    let img = ds.depth_image().unwrap();
    assert_eq!(img.get_pixel(1, 0).0, [128]);
    assert_eq!(img.get_pixel(0, 0).0, [0]);
}
