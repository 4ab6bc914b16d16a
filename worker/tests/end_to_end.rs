use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{http::StatusCode, routing::post, Json, Router};
use common::{Application, ErrorResponse, KeyValue, Task, TaskKey, TaskKind, WordCount};
use coordinator::{Coordinator, CoordinatorConfig};
use tokio::{net::TcpListener, task::JoinHandle, time::timeout};
use worker::{AckOutcome, CoordinatorClient, Worker, WorkerConfig, WorkerExit};

fn temp_dir(sub: &str) -> PathBuf {
    let base = env::temp_dir().join("worker_e2e_tests").join(sub);
    let _ = fs::remove_dir_all(&base);
    fs::create_dir_all(&base).unwrap();
    base
}

fn write_input(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

/// Levanta un coordinator real en un puerto efímero.
async fn start_coordinator(
    config: CoordinatorConfig,
) -> (String, Coordinator, JoinHandle<std::io::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let job = Coordinator::start(config).unwrap();
    let server = tokio::spawn(coordinator::serve(listener, job.clone()));
    (format!("http://{addr}"), job, server)
}

fn worker_config(url: &str, dir: &Path) -> WorkerConfig {
    WorkerConfig {
        coordinator_url: url.to_string(),
        work_dir: dir.to_path_buf(),
        heartbeat_interval: Duration::from_millis(50),
        heartbeat_timeout: Duration::from_secs(1),
        ack_retry_interval: Duration::from_millis(50),
    }
}

fn spawn_worker(worker: anyhow::Result<Worker>) -> JoinHandle<anyhow::Result<WorkerExit>> {
    let worker = worker.unwrap();
    tokio::spawn(async move { worker.run().await })
}

/// Coordinator falso que responde todos los acks con `status`.
async fn start_fake_coordinator(status: StatusCode) -> String {
    let app = Router::new().route(
        "/api/v1/tasks/ack",
        post(move || async move {
            (
                status,
                Json(ErrorResponse {
                    error: "cuerpo inválido".to_string(),
                }),
            )
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// Salida final: todas las líneas de mr-out-*, ordenadas.
fn merged_output(dir: &Path, buckets: u32) -> Vec<String> {
    let mut lines = Vec::new();
    for b in 0..buckets {
        let content = fs::read_to_string(dir.join(format!("mr-out-{b}"))).unwrap();
        lines.extend(content.lines().map(str::to_string));
    }
    lines.sort();
    lines
}

/// WordCount cuya primera llamada a `transform` se queda dormida: simula un
/// worker lento o particionado que pierde su lease.
struct SlowOnce {
    delayed: AtomicBool,
    delay: Duration,
}

impl Application for SlowOnce {
    fn name(&self) -> &str {
        "slow-wordcount"
    }

    fn transform(&self, source: &str, content: &str) -> Vec<KeyValue> {
        if !self.delayed.swap(true, Ordering::SeqCst) {
            std::thread::sleep(self.delay);
        }
        WordCount.transform(source, content)
    }

    fn aggregate(&self, key: &str, values: &[String]) -> String {
        WordCount.aggregate(key, values)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wordcount_con_dos_workers_produce_el_conteo_esperado() {
    let dir = temp_dir("wordcount");
    let a = write_input(&dir, "split-a.txt", "a b a");
    let b = write_input(&dir, "split-b.txt", "b a");

    let config = CoordinatorConfig {
        grace_period: Duration::from_millis(500),
        ..CoordinatorConfig::new(vec![a, b], 2)
    };
    let (url, job, server) = start_coordinator(config).await;

    let w1 = spawn_worker(Worker::new(worker_config(&url, &dir), Arc::new(WordCount)));
    let w2 = spawn_worker(Worker::new(worker_config(&url, &dir), Arc::new(WordCount)));

    timeout(Duration::from_secs(20), server)
        .await
        .expect("el job no terminó a tiempo")
        .unwrap()
        .unwrap();
    assert!(job.is_done());

    for w in [w1, w2] {
        let exit = timeout(Duration::from_secs(5), w).await.unwrap().unwrap();
        assert!(exit.is_ok(), "el worker terminó con error: {:?}", exit);
    }

    assert_eq!(merged_output(&dir, 2), vec!["a 3", "b 2"]);
    for task in 1..=2 {
        for bucket in 0..2 {
            assert!(dir.join(format!("mr-{task}-{bucket}")).exists());
        }
    }

    let status = job.status().await;
    assert_eq!(status.completed_partition_tasks, 2);
    assert_eq!(status.completed_aggregate_tasks, 2);
    assert_eq!(status.redispatches, 0);
    assert_eq!(status.registered_aggregate_inputs, 4);
    assert_eq!(status.rejected_acks, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_demorado_pierde_el_lease_y_el_job_termina_igual() {
    let dir = temp_dir("slow_worker");
    let a = write_input(&dir, "split-a.txt", "a b a");
    let b = write_input(&dir, "split-b.txt", "b a");

    let config = CoordinatorConfig {
        lease_timeout: Duration::from_millis(300),
        grace_period: Duration::from_secs(2),
        ..CoordinatorConfig::new(vec![a, b], 2)
    };
    let (url, job, server) = start_coordinator(config).await;

    // El worker lento no mira el heartbeat a tiempo: tiene que llegar a
    // registrar y confirmar su copia después de que otro la completó.
    let slow_app = Arc::new(SlowOnce {
        delayed: AtomicBool::new(false),
        delay: Duration::from_secs(1),
    });
    let slow_config = WorkerConfig {
        heartbeat_interval: Duration::from_secs(30),
        ..worker_config(&url, &dir)
    };
    let slow = spawn_worker(Worker::new(slow_config, slow_app));

    // esperar a que el lento tenga su tarea antes de arrancar el segundo
    timeout(Duration::from_secs(5), async {
        while job.status().await.pending_tasks == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let fast = spawn_worker(Worker::new(worker_config(&url, &dir), Arc::new(WordCount)));

    timeout(Duration::from_secs(20), server)
        .await
        .expect("el job no terminó: posible deadlock")
        .unwrap()
        .unwrap();

    let slow_exit = timeout(Duration::from_secs(5), slow).await.unwrap().unwrap();
    assert_eq!(slow_exit.unwrap(), WorkerExit::TaskStreamClosed);
    let fast_exit = timeout(Duration::from_secs(5), fast).await.unwrap().unwrap();
    assert!(fast_exit.is_ok());

    let status = job.status().await;
    assert!(status.redispatches >= 1);
    assert_eq!(status.completed_partition_tasks, 2);
    assert_eq!(status.completed_aggregate_tasks, 2);

    // 2 tareas x 2 buckets del rápido, más los 2 buckets que el lento
    // registró después de que su reemplazo confirmara la tarea
    assert_eq!(status.registered_aggregate_inputs, 6);
    // el ack del lento llegó cuando la clave ya no estaba pendiente
    assert_eq!(status.rejected_acks, 1);

    // los duplicados se toleran: sólo se exige que estén todas las claves
    let keys: Vec<String> = merged_output(&dir, 2)
        .iter()
        .map(|l| l.split(' ').next().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["a", "b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn heartbeat_unhealthy_tras_terminar_y_worker_sale_sin_error() {
    let dir = temp_dir("heartbeat");

    // sin entradas: una sola tarea de agregación vacía
    let config = CoordinatorConfig {
        grace_period: Duration::from_secs(2),
        ..CoordinatorConfig::new(vec![], 1)
    };
    let (url, job, server) = start_coordinator(config).await;

    let exit = timeout(
        Duration::from_secs(10),
        Worker::new(worker_config(&url, &dir), Arc::new(WordCount))
            .unwrap()
            .run(),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(matches!(
        exit,
        WorkerExit::CoordinatorClosing | WorkerExit::TaskStreamClosed
    ));

    let client = CoordinatorClient::new(url.as_str()).unwrap();
    assert!(!client.heartbeat().await.unwrap());
    assert!(!client.heartbeat().await.unwrap());
    assert_eq!(fs::read_to_string(dir.join("mr-out-0")).unwrap(), "");

    timeout(Duration::from_secs(10), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(job.is_done());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn entrada_ilegible_es_fatal_para_el_worker() {
    let dir = temp_dir("missing_input");
    let missing = dir.join("no_existe.txt").to_string_lossy().to_string();

    let (url, job, server) = start_coordinator(CoordinatorConfig::new(vec![missing], 1)).await;

    let res = timeout(
        Duration::from_secs(10),
        Worker::new(worker_config(&url, &dir), Arc::new(WordCount))
            .unwrap()
            .run(),
    )
    .await
    .unwrap();

    let err = res.unwrap_err();
    assert!(format!("{err:#}").contains("no_existe.txt"));
    assert!(!dir.join("mr-1-0").exists());

    // la tarea quedó pendiente, sin ack
    let status = job.status().await;
    assert_eq!(status.pending_tasks, 1);
    assert_eq!(status.completed_partition_tasks, 0);

    server.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_ack_desconocido_es_unknown_task() {
    let dir = temp_dir("client_ack");
    let input = write_input(&dir, "split.txt", "x");
    let (url, _job, server) = start_coordinator(CoordinatorConfig::new(vec![input], 1)).await;
    let client = CoordinatorClient::new(format!("{url}/")).unwrap();

    let outcome = client
        .acknowledge(&TaskKey::new(TaskKind::Partition, "42"))
        .await
        .unwrap();
    assert!(matches!(outcome, AckOutcome::UnknownTask(_)));

    let task = client.fetch_task().await.unwrap().unwrap();
    assert_eq!(task.id, "1");
    client
        .register_aggregate_input(&task.id, 0, "mr-1-0")
        .await
        .unwrap();
    assert_eq!(
        client.acknowledge(&task.key()).await.unwrap(),
        AckOutcome::Accepted
    );
    assert!(client.heartbeat().await.unwrap());

    server.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn coordinator_que_no_responde_se_detecta_por_timeout_de_heartbeat() {
    let dir = temp_dir("silent_coordinator");

    // acepta conexiones y nunca contesta
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = WorkerConfig {
        heartbeat_timeout: Duration::from_millis(200),
        ..worker_config(&format!("http://{addr}"), &dir)
    };
    let exit = timeout(
        Duration::from_secs(5),
        Worker::new(config, Arc::new(WordCount)).unwrap().run(),
    )
    .await
    .expect("el worker siguió bloqueado en el heartbeat")
    .unwrap();

    assert_eq!(exit, WorkerExit::CoordinatorUnreachable);
    silent.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ack_rechazado_con_4xx_no_se_reintenta() {
    let url = start_fake_coordinator(StatusCode::UNPROCESSABLE_ENTITY).await;
    let client = CoordinatorClient::new(url.as_str()).unwrap();

    let outcome = client
        .acknowledge(&TaskKey::new(TaskKind::Aggregate, "0"))
        .await
        .unwrap();
    assert!(matches!(outcome, AckOutcome::Rejected { status: 422, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ack_con_5xx_es_error_de_transporte() {
    let url = start_fake_coordinator(StatusCode::SERVICE_UNAVAILABLE).await;
    let client = CoordinatorClient::new(url.as_str()).unwrap();

    let res = client
        .acknowledge(&TaskKey::new(TaskKind::Aggregate, "0"))
        .await;
    assert!(res.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ack_rechazado_es_fatal_para_el_worker() {
    let dir = temp_dir("ack_rejected");
    let url = start_fake_coordinator(StatusCode::BAD_REQUEST).await;
    let worker = Worker::new(worker_config(&url, &dir), Arc::new(WordCount)).unwrap();

    let res = timeout(
        Duration::from_secs(5),
        worker.execute(Task::aggregate(0, vec![], 1)),
    )
    .await
    .expect("el ack rechazado no debería reintentarse");

    let err = res.unwrap_err();
    assert!(format!("{err:#}").contains("400"));
    assert!(dir.join("mr-out-0").exists());
}
