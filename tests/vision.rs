use onnxkit::vision::{letterbox, yolo, craft};

#[test]
fn letterbox_then_yolo_full_pipeline_matches_the_known_scenario() {
    let lb = letterbox(640, 480, 320);
    assert_eq!((lb.scale, lb.pad_x, lb.pad_y), (0.5, 0.0, 40.0));

    let num_classes = 4;
    let mut output = vec![0.0f32; 4 + num_classes];
    output[0] = 160.0; // cx
    output[1] = 160.0; // cy
    output[2] = 40.0; // w
    output[3] = 40.0; // h
    output[4 + 3] = 0.9; // class 3 score

    let detections = yolo::decode(&output, num_classes, 1, &lb, 640, 480, 0.5, 0.5);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_index, 3);
}

#[test]
fn craft_decode_finds_two_disjoint_text_regions_in_original_coordinates() {
    let (height, width) = (20, 20);
    let mut heatmap = vec![0.0f32; height * width * 2];
    for r in 1..3 {
        for c in 1..3 {
            heatmap[(r * width + c) * 2] = 0.9;
        }
    }
    for r in 10..13 {
        for c in 10..13 {
            heatmap[(r * width + c) * 2] = 0.9;
        }
    }

    let regions = craft::decode(&heatmap, height, width, 1.0, 40, 40, 0.4, 0.4, 1);
    assert_eq!(regions.len(), 2);
    assert!(regions.iter().all(|r| r.box_xyxy[2] <= 40.0 && r.box_xyxy[3] <= 40.0));
}
