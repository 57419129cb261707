use crate::format::{AudioFormat, VideoFormat};
use crate::frame::{Frame, FRAME_ALIGN};

#[test]
fn test_video_frame_geometry() {
    let frame = Frame::new_video_frame(&VideoFormat::yuv420p8(), 64, 48, None);

    assert_eq!(frame.get_width(0), 64);
    assert_eq!(frame.get_height(0), 48);
    assert_eq!(frame.get_width(1), 32);
    assert_eq!(frame.get_height(2), 24);

    for plane in 0..3 {
        assert!(frame.get_stride(plane) as usize % FRAME_ALIGN == 0);
        assert!(frame.get_stride(plane) >= frame.get_width(plane) as isize);
    }
}

#[test]
fn test_new_frames_are_zeroed() {
    let frame = Frame::new_video_frame(&VideoFormat::gray8(), 16, 16, None);
    assert!(frame.row::<u8>(0, 7).iter().all(|&v| v == 0));
}

#[test]
fn test_copy_frame_is_independent() {
    let mut original = Frame::new_video_frame(&VideoFormat::gray8(), 16, 8, None);
    original.row_mut::<u8>(0, 0).fill(42);
    original.properties_mut().set_int("tag", 7).unwrap();

    let mut copy = original.copy_frame();
    assert_eq!(copy, original);
    assert_eq!(copy.properties().get_int("tag"), Ok(7));

    // Mutating the copy affects neither pixels nor properties of the
    // original.
    copy.row_mut::<u8>(0, 0).fill(99);
    copy.properties_mut().set_int("tag", 8).unwrap();

    assert_eq!(original.row::<u8>(0, 0)[0], 42);
    assert_eq!(original.properties().get_int("tag"), Ok(7));
    assert_ne!(copy, original);
}

#[test]
#[should_panic(expected = "uniquely owned")]
fn test_shared_frame_write_panics() {
    let mut frame = Frame::new_video_frame(&VideoFormat::gray8(), 16, 8, None);
    let _other = frame.clone();
    frame.row_mut::<u8>(0, 0).fill(1);
}

#[test]
fn test_make_unique_allows_writing_after_sharing() {
    let mut frame = Frame::new_video_frame(&VideoFormat::gray8(), 16, 8, None);
    let other = frame.clone();
    frame.make_unique();
    frame.row_mut::<u8>(0, 0).fill(5);

    assert_eq!(other.row::<u8>(0, 0)[0], 0);
    assert_eq!(frame.row::<u8>(0, 0)[0], 5);
}

#[test]
fn test_plane_sharing() {
    let mut src = Frame::new_video_frame(&VideoFormat::yuv420p8(), 16, 8, None);
    for plane in 0..3 {
        let height = src.get_height(plane);
        for y in 0..height {
            src.row_mut::<u8>(plane, y).fill(plane as u8 + 1);
        }
    }

    // Plane 0 is fresh, planes 1 and 2 alias the source.
    let shared = Frame::new_video_frame2(
        &VideoFormat::yuv420p8(),
        16,
        8,
        &[None, Some(&src), Some(&src)],
        &[0, 1, 2],
        Some(&src),
    );

    assert_eq!(shared.row::<u8>(0, 0)[0], 0);
    assert_eq!(shared.row::<u8>(1, 0)[0], 2);
    assert_eq!(shared.row::<u8>(2, 0)[0], 3);
}

#[test]
#[should_panic(expected = "shared")]
fn test_writing_shared_plane_panics() {
    let src = Frame::new_video_frame(&VideoFormat::gray8(), 16, 8, None);
    let mut shared = Frame::new_video_frame2(
        &VideoFormat::gray8(),
        16,
        8,
        &[Some(&src)],
        &[0],
        None,
    );
    shared.row_mut::<u8>(0, 0).fill(1);
}

#[test]
fn test_audio_frame_channels() {
    let mut frame = Frame::new_audio_frame(&AudioFormat::STEREO16, 3072, None);
    assert_eq!(frame.get_length(), 3072);

    frame.channel_mut::<i16>(0).fill(-5);
    frame.channel_mut::<i16>(1).fill(9);

    assert!(frame.channel::<i16>(0).iter().all(|&v| v == -5));
    assert!(frame.channel::<i16>(1).iter().all(|&v| v == 9));
}

#[test]
fn test_well_known_properties() {
    let mut frame = Frame::new_video_frame(&VideoFormat::gray8(), 8, 8, None);
    frame.set_duration(1001, 30000);
    frame.set_field(crate::frame::Field::Top);

    assert_eq!(frame.duration(), Some((1001, 30000)));
    assert_eq!(frame.field(), Some(crate::frame::Field::Top));
    assert_eq!(frame.field_based(), None);

    // Property map travels with prop_src.
    let derived = Frame::new_video_frame(&VideoFormat::gray8(), 8, 8, Some(&frame));
    assert_eq!(derived.duration(), Some((1001, 30000)));
}
