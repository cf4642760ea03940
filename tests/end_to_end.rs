use futures::future::join_all;
use image::{Rgba, RgbaImage};
use minerender::resource_pack::AssetKey;
use minerender::{BlockStateProperties, MemoryFetcher, RenderSession, SessionConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const ROOT: &str = "https://assets.example";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn props(pairs: &[(&str, &str)]) -> BlockStateProperties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn oak_stairs_blockstate() -> Value {
    json!({ "multipart": [
        {
            "when": { "facing": "north", "half": "bottom", "shape": "straight" },
            "apply": { "model": "block/oak_stairs", "y": 270, "uvlock": true }
        },
        {
            "when": { "facing": "south", "half": "bottom", "shape": "straight" },
            "apply": { "model": "block/oak_stairs", "y": 90, "uvlock": true }
        },
        {
            "when": { "facing": "north|south", "half": "top", "shape": "straight" },
            "apply": { "model": "block/oak_stairs", "x": 180, "uvlock": true }
        }
    ] })
}

fn stairs_model() -> Value {
    json!({
        "parent": "block/block",
        "textures": { "particle": "#side" },
        "elements": [
            {
                "from": [0, 0, 0], "to": [16, 8, 16],
                "faces": {
                    "down":  { "uv": [0, 0, 16, 16], "texture": "#bottom", "cullface": "down" },
                    "up":    { "uv": [0, 0, 16, 16], "texture": "#top" },
                    "north": { "uv": [0, 8, 16, 16], "texture": "#side", "cullface": "north" },
                    "south": { "uv": [0, 8, 16, 16], "texture": "#side", "cullface": "south" },
                    "west":  { "uv": [0, 8, 16, 16], "texture": "#side", "cullface": "west" },
                    "east":  { "uv": [0, 8, 16, 16], "texture": "#side", "cullface": "east" }
                }
            },
            {
                "from": [8, 8, 0], "to": [16, 16, 16],
                "faces": {
                    "up":    { "texture": "#top", "rotation": 90 },
                    "north": { "texture": "#side", "cullface": "north" },
                    "south": { "texture": "#side", "cullface": "south" },
                    "west":  { "texture": "#side" },
                    "east":  { "texture": "#side", "cullface": "east" }
                }
            }
        ]
    })
}

fn asset_host() -> Arc<MemoryFetcher> {
    let fetcher = Arc::new(MemoryFetcher::new());
    let assets = format!("{ROOT}/assets/minecraft");
    fetcher.insert_json(format!("{assets}/blockstates/oak_stairs.json"), &oak_stairs_blockstate());
    fetcher.insert_json(
        format!("{assets}/models/block/oak_stairs.json"),
        &json!({
            "parent": "block/stairs",
            "textures": {
                "bottom": "block/oak_planks",
                "top": "block/oak_planks",
                "side": "block/oak_log"
            }
        }),
    );
    fetcher.insert_json(format!("{assets}/models/block/stairs.json"), &stairs_model());
    fetcher.insert_json(
        format!("{assets}/models/block/block.json"),
        &json!({ "display": { "gui": { "rotation": [30, 225, 0] } } }),
    );
    fetcher.insert(format!("{assets}/textures/block/oak_planks.png"), png(16, 16, [162, 130, 78, 255]));
    fetcher.insert(format!("{assets}/textures/block/oak_log.png"), png(16, 16, [109, 85, 50, 255]));
    fetcher
}

fn session(fetcher: &Arc<MemoryFetcher>) -> RenderSession {
    let config = SessionConfig::default()
        .with_root(ROOT)
        .with_throttle(Duration::from_millis(1));
    RenderSession::new(fetcher.clone(), config)
}

#[tokio::test]
async fn oak_stairs_resolves_to_textured_geometry() {
    init_logger();
    let fetcher = asset_host();
    let session = session(&fetcher);
    let state = props(&[("facing", "north"), ("half", "bottom"), ("shape", "straight")]);

    let variants = session.variants("minecraft:oak_stairs", &state).await.unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].model, "block/oak_stairs");
    assert_eq!(variants[0].transform().euler_degrees(), [0.0, 90.0, 0.0]);

    let merged = session.merged_model("block/oak_stairs").await.unwrap().unwrap();
    assert_eq!(merged.elements().len(), 2);
    assert_eq!(merged.hierarchy, vec!["block/stairs".to_string(), "block/block".to_string()]);
    assert_eq!(merged.textures.get("particle"), Some("#side"));
    assert!(merged.display.is_some());

    let key = AssetKey::model("block/oak_stairs").unwrap().with_root(ROOT);
    let mapped = session.mapped_model(&key).await.unwrap().unwrap();
    let atlas = mapped.atlas.as_ref().unwrap();
    let planks = atlas.entry("block/oak_planks").copied().unwrap();
    let oak_log = atlas.entry("block/oak_log").copied().unwrap();
    assert_ne!(planks.position, oak_log.position);
    assert_eq!(atlas.entry("#particle"), Some(&oak_log));
    assert!(!atlas.transparent);

    let block = session.block("minecraft:oak_stairs", state).await.unwrap();
    let children = block.root().children();
    assert_eq!(children.len(), 1);
    let stairs = &children[0];
    assert!(!stairs.is_placeholder());

    let mesh = stairs.mesh().unwrap();
    assert_eq!(mesh.triangle_count(), 24);
    let uvs = mesh.uvs_flat();
    assert!(!uvs.is_empty());
    assert!(uvs.iter().all(|c| (0.0..=1.0).contains(c)), "uv out of range: {:?}", uvs);

    let png = stairs.material().unwrap().image_png().unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!(decoded.width(), atlas.width());
}

#[tokio::test]
async fn state_change_rebuilds_block() {
    init_logger();
    let fetcher = asset_host();
    let session = session(&fetcher);

    let mut block = session
        .block("minecraft:oak_stairs", BlockStateProperties::new())
        .await
        .unwrap();
    // Only the first property of the first multipart condition is a default.
    assert_eq!(block.properties(), &props(&[("facing", "north")]));
    assert!(block.variants().is_empty());

    block
        .set_state(props(&[("facing", "south"), ("half", "bottom"), ("shape", "straight")]))
        .await
        .unwrap();
    assert_eq!(block.variants()[0].y, Some(90));
    assert_eq!(block.root().children().len(), 1);

    block.set_state(props(&[("half", "top")])).await.unwrap();
    assert_eq!(block.variants().len(), 1);
    assert_eq!(block.variants()[0].x, Some(180));

    block.set_state(props(&[("shape", "outer_left")])).await.unwrap();
    assert!(block.variants().is_empty());
    assert!(block.root().children().is_empty());
}

#[tokio::test]
async fn concurrent_instanced_blocks_share_one_object() {
    init_logger();
    let fetcher = asset_host();
    let session = session(&fetcher);
    let state = props(&[("facing", "north"), ("half", "bottom"), ("shape", "straight")]);

    let calls = (0..6).map(|_| session.instanced_block("minecraft:oak_stairs", state.clone()));
    let refs: Vec<_> = join_all(calls)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    let object = refs[0].object();
    assert!(refs.iter().all(|r| Arc::ptr_eq(r.object(), object)));
    let mut slots: Vec<usize> = refs.iter().map(|r| r.slot()).collect();
    slots.sort_unstable();
    assert_eq!(slots, vec![0, 1, 2, 3, 4, 5]);

    let blockstate = format!("{ROOT}/assets/minecraft/blockstates/oak_stairs.json");
    assert_eq!(fetcher.request_count(&blockstate), 1);
    let texture = format!("{ROOT}/assets/minecraft/textures/block/oak_planks.png");
    assert_eq!(fetcher.request_count(&texture), 1);

    refs[2].set_position(glam::Vec3::new(2.0, 0.0, 0.0)).unwrap();
    assert!(refs[3].position().unwrap().length() < 1e-6);
}

#[tokio::test]
async fn missing_assets_degrade_to_placeholders() {
    init_logger();
    let fetcher = asset_host();
    fetcher.insert_json(
        format!("{ROOT}/assets/minecraft/blockstates/mystery.json"),
        &json!({ "variants": { "": { "model": "block/mystery" } } }),
    );
    let session = session(&fetcher);

    let block = session.block("minecraft:mystery", BlockStateProperties::new()).await.unwrap();
    let children = block.root().children();
    assert_eq!(children.len(), 1);
    assert!(children[0].is_placeholder());
}

#[tokio::test]
async fn resource_pack_directory_serves_assets() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("assets/minecraft/models/block");
    let textures = dir.path().join("assets/minecraft/textures/block");
    std::fs::create_dir_all(&models).unwrap();
    std::fs::create_dir_all(&textures).unwrap();
    std::fs::write(models.join("stairs.json"), stairs_model().to_string()).unwrap();
    std::fs::write(models.join("block.json"), b"{}").unwrap();
    std::fs::write(
        models.join("oak_stairs.json"),
        json!({ "parent": "block/stairs", "textures": { "bottom": "block/oak_planks", "top": "block/oak_planks", "side": "block/oak_planks" } })
            .to_string(),
    )
    .unwrap();
    std::fs::write(textures.join("oak_planks.png"), png(16, 16, [162, 130, 78, 255])).unwrap();

    let session = minerender::open_resource_pack(dir.path(), SessionConfig::default()).unwrap();
    let object = session.model("block/oak_stairs").await.unwrap();
    assert!(!object.is_placeholder());

    let listed = session.list("models", Some("block")).await.unwrap();
    assert_eq!(listed, vec!["block", "oak_stairs", "stairs"]);
}
