mod common;

#[cfg(test)]
mod tests {
    use super::common::{decode_frames, dir_is_empty, framed_frames, noise_frames, write_gif};
    use animfit::{
        FailureReason, GifOps, ImageOps, Loader, OptimizationRequest, OptimizationResult,
        OptimizeError, OptimizeParams, Optimizer, OptimizerConfig,
    };
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use std::fs;

    fn optimizer(temp: &TempDir) -> Optimizer {
        Optimizer::new(OptimizerConfig {
            scratch_root: Some(temp.path().join("scratch")),
            ..Default::default()
        })
    }

    #[test]
    fn test_probe_reads_canvas_and_frames() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("clip.gif");
        write_gif(input.path(), noise_frames(48, 32, 6, 1));

        let metadata = optimizer(&temp_dir).probe(input.path()).unwrap();

        assert_eq!((metadata.width, metadata.height), (48, 32));
        assert_eq!(metadata.frame_count, 6);
        assert_eq!(metadata.size_bytes, fs::metadata(input.path()).unwrap().len());
    }

    #[test]
    fn test_probe_rejects_non_gif() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("notes.gif");
        input.write_str("definitely not a gif").unwrap();

        let err = optimizer(&temp_dir).probe(input.path()).unwrap_err();
        assert!(matches!(err, OptimizeError::Probe(_)));
    }

    #[test]
    fn test_conforming_gif_is_copied_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("clip.gif");
        let output = temp_dir.child("out.gif");
        write_gif(input.path(), noise_frames(48, 32, 4, 2));

        let request = OptimizationRequest::new(input.path(), output.path(), 2 * 1024 * 1024)
            .with_min_dimensions(1, 1);
        let report = optimizer(&temp_dir).optimize(&request).unwrap();

        assert!(report.result.is_success());
        assert_eq!(fs::read(output.path()).unwrap(), fs::read(input.path()).unwrap());
    }

    #[test]
    fn test_output_aliasing_source_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("clip.gif");
        temp_dir.child("sub").create_dir_all().unwrap();
        write_gif(input.path(), noise_frames(48, 32, 4, 2));
        let original = fs::read(input.path()).unwrap();

        let alias = temp_dir.path().join("sub").join("..").join("clip.gif");
        let request = OptimizationRequest::new(input.path(), &alias, 2 * 1024 * 1024)
            .with_min_dimensions(1, 1);
        let err = optimizer(&temp_dir).optimize(&request).unwrap_err();

        assert!(matches!(err, OptimizeError::Validation(_)));
        assert_eq!(fs::read(input.path()).unwrap(), original);
    }

    #[test]
    fn test_small_gif_is_padded_to_minimum() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("tiny.gif");
        let output = temp_dir.child("out.gif");
        let green = [0, 255, 0, 255];
        let red = [255, 0, 0, 255];
        write_gif(input.path(), framed_frames(60, 40, 4, green, red));
        let original = fs::read(input.path()).unwrap();

        let request = OptimizeParams::preset()
            .into_request(input.path(), output.path())
            .unwrap();
        let report = optimizer(&temp_dir).optimize(&request).unwrap();

        match report.result {
            OptimizationResult::Success { metadata, .. } => {
                assert_eq!((metadata.width, metadata.height), (180, 180));
                assert_eq!(metadata.frame_count, 4);
            }
            other => panic!("expected success, got {:?}", other),
        }

        let frames = decode_frames(output.path());
        assert_eq!(frames.len(), 4);
        let corner = frames[0].buffer().get_pixel(0, 0);
        assert!(corner[1] > 150 && corner[0] < 100, "corner was {:?}", corner);

        assert_eq!(fs::read(input.path()).unwrap(), original);
        assert!(dir_is_empty(&temp_dir.path().join("scratch")));
    }

    #[test]
    fn test_large_gif_is_downscaled() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("wide.gif");
        let output = temp_dir.child("out.gif");
        write_gif(input.path(), noise_frames(400, 200, 3, 3));

        let request = OptimizationRequest::new(input.path(), output.path(), 2 * 1024 * 1024)
            .with_min_dimensions(10, 10)
            .with_max_dimensions(Some(100), Some(100));
        let report = optimizer(&temp_dir).optimize(&request).unwrap();

        match report.result {
            OptimizationResult::Success { metadata, .. } => {
                assert_eq!((metadata.width, metadata.height), (100, 50));
                assert_eq!(metadata.frame_count, 3);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(decode_frames(output.path()).len(), 3);
    }

    #[test]
    fn test_palette_reduction_meets_budget_without_dropping_frames() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("noise.gif");
        let output = temp_dir.child("out.gif");
        write_gif(input.path(), noise_frames(96, 96, 6, 4));
        let size = fs::metadata(input.path()).unwrap().len();
        let budget = size * 9 / 10;

        let request = OptimizationRequest::new(input.path(), output.path(), budget)
            .with_min_dimensions(1, 1);
        let report = optimizer(&temp_dir).optimize(&request).unwrap();

        match report.result {
            OptimizationResult::Success { metadata, .. } => {
                assert_eq!(metadata.frame_count, 6);
                assert!(metadata.size_bytes <= budget);
                assert_eq!(fs::metadata(output.path()).unwrap().len(), metadata.size_bytes);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_sampling_keeps_reduced_palette() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("noise.gif");
        let reduced = temp_dir.child("reduced.gif");
        let sampled = temp_dir.child("sampled.gif");
        write_gif(input.path(), noise_frames(96, 96, 12, 14));

        let ops = GifOps::default();
        ops.recolor(input.path(), reduced.path(), 32).unwrap();
        let every_frame: Vec<usize> = (0..12).collect();
        ops.sample_frames(reduced.path(), sampled.path(), &every_frame).unwrap();

        let loader = Loader::new();
        assert!(loader.palette_colors(sampled.path()).unwrap() <= 32);

        let reduced_size = fs::metadata(reduced.path()).unwrap().len();
        let sampled_size = fs::metadata(sampled.path()).unwrap().len();
        assert!(
            sampled_size <= reduced_size + reduced_size / 100,
            "sampling grew {} -> {}",
            reduced_size,
            sampled_size
        );
        assert_eq!(ops.probe(sampled.path()).unwrap().frame_count, 12);
    }

    #[test]
    fn test_approval_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("noise.gif");
        let output = temp_dir.child("out.gif");
        write_gif(input.path(), noise_frames(64, 64, 12, 5));
        let size = fs::metadata(input.path()).unwrap().len();
        let optimizer = optimizer(&temp_dir);

        let request = OptimizationRequest::new(input.path(), output.path(), size / 3)
            .with_min_dimensions(1, 1);
        let first = optimizer.optimize(&request).unwrap();

        assert!(matches!(first.result, OptimizationResult::ApprovalRequired { .. }));
        assert!(!output.path().exists());
        assert!(dir_is_empty(&temp_dir.path().join("scratch")));

        // Same source, resubmitted with consent.
        let approved = request.with_frame_reduction(true);
        let second = optimizer.optimize(&approved).unwrap();

        match second.result {
            OptimizationResult::Success { metadata, .. } => {
                assert!(metadata.frame_count < 12);
                assert!(metadata.size_bytes <= size / 3);
                assert_eq!(decode_frames(output.path()).len(), metadata.frame_count as usize);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert!(dir_is_empty(&temp_dir.path().join("scratch")));
    }

    #[test]
    fn test_impossible_budget_fails_at_one_frame() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.child("noise.gif");
        let output = temp_dir.child("out.gif");
        write_gif(input.path(), noise_frames(64, 64, 6, 6));

        let request = OptimizationRequest::new(input.path(), output.path(), 500)
            .with_min_dimensions(1, 1)
            .with_frame_reduction(true);
        let report = optimizer(&temp_dir).optimize(&request).unwrap();

        match report.result {
            OptimizationResult::Failed {
                reason,
                best_achieved_size_bytes,
                frame_count,
            } => {
                assert_eq!(reason, FailureReason::BudgetUnreachable);
                assert_eq!(frame_count, 1);
                assert!(best_achieved_size_bytes > 500);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!output.path().exists());
        assert!(input.path().exists());
        assert!(dir_is_empty(&temp_dir.path().join("scratch")));
    }

    #[test]
    fn test_batch_runs_under_tight_memory_budget() {
        use animfit::prelude::*;

        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.child("in");
        let output_dir = temp_dir.child("out");
        input_dir.child("nested").create_dir_all().unwrap();
        write_gif(input_dir.child("a.gif").path(), noise_frames(40, 30, 3, 20));
        write_gif(input_dir.child("b.gif").path(), noise_frames(30, 40, 3, 21));
        write_gif(input_dir.child("nested/c.gif").path(), noise_frames(50, 50, 2, 22));

        // Smaller than any single decoded asset, so files run one at a time.
        let processor = BatchProcessor::new(optimizer(&temp_dir), OptimizeParams::preset(), 3)
            .unwrap()
            .with_progress(false)
            .with_memory_budget(1024);
        let stats = processor
            .process_directory(input_dir.path(), output_dir.path(), true)
            .unwrap();

        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.failed, 0);
        for name in ["a.gif", "b.gif", "nested/c.gif"] {
            let frames = decode_frames(output_dir.child(name).path());
            assert_eq!(frames[0].buffer().dimensions(), (180, 180));
        }
        assert!(dir_is_empty(&temp_dir.path().join("scratch")));
    }
}
