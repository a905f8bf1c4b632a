use std::sync::LazyLock;

use regex::Regex;

use crate::params::{estimate_parameters, ParamEstimate};
use crate::types::{Candidate, SafetyStatus, SkipReason};

// --- Domain keyword sets ---

const GENERATIVE_PIPELINES: &[&str] = &[
    "text-to-image",
    "image-to-image",
    "text-to-video",
    "image-to-video",
    "video-generation",
    "text-to-3d",
    "image-to-3d",
    "3d",
    "diffusion",
    "unconditional-image-generation",
];

const GENERATIVE_TAGS: &[&str] = &[
    "diffusers",
    "stable-diffusion",
    "sdxl",
    "comfyui",
    "controlnet",
    "flux",
    "template:diffusion-lora",
];

const GENERATIVE_KEYWORDS: &[&str] = &[
    "comfyui",
    "diffusers",
    "stable diffusion",
    "sdxl",
    "controlnet",
    "gaussian splatting",
    "gsplat",
    "splatting",
    "nerf",
    "point cloud",
];

const ROBOTICS_TAGS: &[&str] = &[
    "robotics",
    "robot",
    "vla",
    "vision-language-action",
    "embodied",
    "reinforcement-learning",
    "lerobot",
    "openvla",
];

const ROBOTICS_KEYWORDS: &[&str] = &[
    "vision-language-action",
    "robot",
    "robotics",
    "embodied",
    "manipulation",
    "gripper",
    "locomotion",
    "reinforcement learning",
    "sim2real",
    "actuator",
];

const VQA_PIPELINES: &[&str] = &[
    "visual-question-answering",
    "document-question-answering",
    "image-text-to-text",
    "image-to-text",
    "image-classification",
    "object-detection",
    "image-segmentation",
    "zero-shot-image-classification",
    "depth-estimation",
];

const VQA_TAGS: &[&str] = &[
    "vqa",
    "docvqa",
    "textvqa",
    "chartqa",
    "visual-reasoning",
    "multimodal",
    "document-question-answering",
    "visual-question-answering",
    "image-captioning",
    "visual-grounding",
];

const VQA_KEYWORDS: &[&str] = &[
    "visual question answering",
    "document question answering",
    "visual inspection",
    "defect",
    "anomaly detection",
    "ocr",
    "table extraction",
    "invoice",
];

const EXPORT_TAGS: &[&str] = &[
    "onnx",
    "onnxruntime",
    "openvino",
    "tensorrt",
    "coreml",
    "tflite",
    "quantized",
    "gguf",
    "gptq",
    "awq",
    "bnb-4bit",
    "int8",
    "int4",
];

const EXPORT_FILE_EXTS: &[&str] = &[".onnx", ".tflite", ".engine", ".gguf", ".awq", ".gptq"];

const NSFW_KEYWORDS: &[&str] = &["porn", "explicit", "hentai", "erotic", "nsfw"];

const MERGE_KEYWORDS: &[&str] = &["mergekit", "merged model", "model_stock", "slerp merge", "dare_ties"];

static QUANT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|[-_.])(gguf|ggml|awq|gptq|exl2|onnx|openvino|tensorrt|coreml|tflite|int[48]|fp8|fp16|bf16|\d+bit|q[2-8](_k(_(xxs|xs|s|m|l|xl))?|_[01])?)($|[-_.])",
    )
    .unwrap()
});

/// Outcome of the hard scope stage for one candidate.
#[derive(Debug, Clone)]
pub struct ScopeOutcome {
    pub rejection: Option<SkipReason>,
    /// Parameter estimate resolved as a side effect of rule 6. `None` total
    /// marks the candidate low-confidence for scoring, never a rejection.
    pub params: ParamEstimate,
}

/// Sequential, short-circuiting exclusion rules. The first matching rule
/// decides the reason code; later rules are not evaluated.
pub fn check_scope(candidate: &Candidate, max_total_params_b: f64, bytes_per_param: f64) -> ScopeOutcome {
    let tags = candidate.tag_set();
    let readme = candidate.readme_text().to_lowercase();
    let id = candidate.id.to_lowercase();
    let pipeline = candidate
        .pipeline_tag
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    // 1. Safety scan. Unconditional, beats trust tier and whitelist.
    if is_unsafe(candidate) {
        return reject(SkipReason::UnsafeWeights);
    }

    // 2. Generative-visual model families.
    if GENERATIVE_PIPELINES.contains(&pipeline.as_str())
        || GENERATIVE_TAGS.iter().any(|t| tags.contains(*t))
        || GENERATIVE_KEYWORDS.iter().any(|k| readme.contains(k))
    {
        return reject(SkipReason::GenerativeVisual);
    }

    // 3. Robotics / VLA policies, unless VQA or inspection use exempts them.
    if is_robotics(&pipeline, &tags, &readme) {
        return reject(SkipReason::RoboticsPolicy);
    }

    // 4. Export / quantization / conversion artifacts.
    if is_export_or_conversion(candidate, &id, &tags) {
        return reject(SkipReason::ExportConversion);
    }

    // 5. Explicit adult content.
    if tags.contains("nsfw")
        || NSFW_KEYWORDS
            .iter()
            .any(|k| id.contains(k) || readme.contains(k))
    {
        return reject(SkipReason::AdultContent);
    }

    // Merge repackages are derivative packaging, same as rule 4.
    if MERGE_KEYWORDS.iter().any(|k| id.contains(k) || readme.contains(k)) {
        return reject(SkipReason::MergeModel);
    }

    // 6. Parameter ceiling. No confident estimate means no rejection here.
    let params = estimate_parameters(candidate, bytes_per_param);
    if let Some(total_b) = params.total_b {
        if total_b > max_total_params_b {
            return ScopeOutcome {
                rejection: Some(SkipReason::ParamsTooLarge),
                params,
            };
        }
    }

    ScopeOutcome {
        rejection: None,
        params,
    }
}

fn reject(reason: SkipReason) -> ScopeOutcome {
    ScopeOutcome {
        rejection: Some(reason),
        params: ParamEstimate::unknown(),
    }
}

fn is_unsafe(candidate: &Candidate) -> bool {
    candidate.safety == SafetyStatus::Flagged
        || candidate
            .files
            .iter()
            .any(|f| f.scan_status == SafetyStatus::Flagged)
}

fn is_robotics(
    pipeline: &str,
    tags: &std::collections::HashSet<String>,
    readme: &str,
) -> bool {
    // Exemption first: inspection and VQA use is explicitly kept.
    if VQA_PIPELINES.contains(&pipeline)
        || VQA_TAGS.iter().any(|t| tags.contains(*t))
        || VQA_KEYWORDS.iter().any(|k| readme.contains(k))
    {
        return false;
    }
    ROBOTICS_TAGS.iter().any(|t| tags.contains(*t))
        || ROBOTICS_KEYWORDS.iter().any(|k| readme.contains(k))
}

fn is_export_or_conversion(
    candidate: &Candidate,
    id: &str,
    tags: &std::collections::HashSet<String>,
) -> bool {
    if EXPORT_TAGS.iter().any(|t| tags.contains(*t)) {
        return true;
    }
    if QUANT_NAME.is_match(id) {
        return true;
    }
    candidate.files.iter().any(|f| {
        let p = f.path.to_lowercase();
        EXPORT_FILE_EXTS.iter().any(|ext| p.ends_with(ext)) || p.contains("/openvino/")
    })
}
