//! Cache-aside générique partitionné en régions
//!
//! [`RegionCache`] garde en mémoire des valeurs déjà résolues. Chaque entrée
//! appartient à une région principale et, éventuellement, à des régions de
//! dépendance : invalider n'importe laquelle de ces régions supprime l'entrée.
//!
//! Garanties :
//! - au plus une population concurrente par clé (verrou asynchrone par clé) ;
//! - une population démarrée avant une invalidation de l'une de ses régions
//!   rend sa valeur à l'appelant mais n'est pas stockée ;
//! - un échec (erreur, annulation, délai dépassé) ne stocke rien, la clé est
//!   simplement retentée au prochain accès.

use crate::key::{CacheKey, Region};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Paramètres d'un [`RegionCache`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSettings {
    /// Nombre maximal d'entrées (`0` = illimité). Au-delà, éviction LRU.
    pub limit: usize,
    /// Durée de vie d'une entrée (`None` = pas d'expiration).
    pub ttl: Option<Duration>,
}

/// Résultat d'une population : la valeur et ses régions de dépendance.
#[derive(Debug, Clone)]
pub struct Populated<V> {
    value: V,
    dependencies: Vec<Region>,
}

impl<V> Populated<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            dependencies: Vec::new(),
        }
    }

    /// Rattache aussi l'entrée à `region`.
    pub fn depends_on(mut self, region: Region) -> Self {
        if !self.dependencies.contains(&region) {
            self.dependencies.push(region);
        }
        self
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn dependencies(&self) -> &[Region] {
        &self.dependencies
    }
}

/// Statistiques d'utilisation du cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub regions: usize,
    pub hits: u64,
    pub misses: u64,
    pub populations: u64,
    pub discarded: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    regions: Vec<Region>,
    inserted_at: Instant,
    last_used: Instant,
    hits: u64,
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<CacheKey, Entry<V>>,
    regions: HashMap<Region, HashSet<CacheKey>>,
    /// Époque de la dernière invalidation de chaque région
    invalidated: HashMap<Region, u64>,
    /// Époques de départ des populations en cours (époque → nombre)
    running: BTreeMap<u64, usize>,
    /// Époque du dernier vidage complet
    flushed: u64,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            regions: HashMap::new(),
            invalidated: HashMap::new(),
            running: BTreeMap::new(),
            flushed: 0,
        }
    }

    fn remove_entry(&mut self, key: &CacheKey) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        for region in &entry.regions {
            if let Some(keys) = self.regions.get_mut(region) {
                keys.remove(key);
                if keys.is_empty() {
                    self.regions.remove(region);
                }
            }
        }
        Some(entry)
    }

    fn finish_population(&mut self, started: u64) {
        if let Some(count) = self.running.get_mut(&started) {
            *count -= 1;
            if *count == 0 {
                self.running.remove(&started);
            }
        }
    }

    /// Une marque d'invalidation n'intéresse que les populations démarrées
    /// avant elle : au-delà de la plus ancienne population en cours, elle
    /// peut être oubliée.
    fn prune_invalidations(&mut self) {
        match self.running.keys().next().copied() {
            None => self.invalidated.clear(),
            Some(oldest) => self.invalidated.retain(|_, at| *at > oldest),
        }
    }

    fn is_stale(&self, regions: &[Region], started: u64) -> bool {
        self.flushed > started
            || regions
                .iter()
                .any(|r| self.invalidated.get(r).is_some_and(|&at| at > started))
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    populations: AtomicU64,
    discarded: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Cache-aside en mémoire, partitionné en régions d'invalidation.
///
/// Conçu pour être construit une fois au démarrage puis partagé derrière un
/// `Arc`. Les valeurs sont clonées à la lecture : utiliser des types dont le
/// clonage est peu coûteux (`bytes::Bytes`, `Arc<_>`).
#[derive(Debug)]
pub struct RegionCache<V> {
    name: String,
    settings: CacheSettings,
    inner: Mutex<Inner<V>>,
    in_flight: Mutex<HashMap<CacheKey, KeyLock>>,
    epoch: AtomicU64,
    counters: Counters,
}

/// Bail sur le verrou d'une clé ; le rend à la table en sortie de portée,
/// y compris quand le futur appelant est abandonné.
struct KeyLease<'a, V> {
    cache: &'a RegionCache<V>,
    key: &'a CacheKey,
    lock: KeyLock,
}

/// Population en cours, enregistrée avec son époque de départ jusqu'à sa
/// fin (succès, erreur ou abandon).
struct PopulationGuard<'a, V> {
    cache: &'a RegionCache<V>,
    started: u64,
}

impl<V> Drop for PopulationGuard<'_, V> {
    fn drop(&mut self) {
        lock_or_recover(&self.cache.inner).finish_population(self.started);
    }
}

impl<V> Drop for KeyLease<'_, V> {
    fn drop(&mut self) {
        let mut in_flight = lock_or_recover(&self.cache.in_flight);
        // Une référence dans la table et la nôtre : plus personne n'attend
        if Arc::strong_count(&self.lock) <= 2 {
            in_flight.remove(self.key);
        }
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<V: Clone> RegionCache<V> {
    /// Crée un cache vide.
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du cache, utilisé dans les logs
    /// * `settings` - Limite de taille et durée de vie des entrées
    pub fn new(name: &str, settings: CacheSettings) -> Self {
        Self {
            name: name.to_string(),
            settings,
            inner: Mutex::new(Inner::new()),
            in_flight: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn lookup(&self, key: &CacheKey) -> Option<V> {
        let mut inner = lock_or_recover(&self.inner);
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            None => return None,
            Some(entry) => self
                .settings
                .ttl
                .is_some_and(|ttl| now.duration_since(entry.inserted_at) >= ttl),
        };

        if expired {
            tracing::debug!("[{}] entry {} expired", self.name, key);
            inner.remove_entry(key);
            return None;
        }

        let entry = inner.entries.get_mut(key)?;
        entry.hits += 1;
        entry.last_used = now;
        Some(entry.value.clone())
    }

    /// Lit une entrée sans jamais la peupler.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let value = self.lookup(key);
        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Retourne la valeur en cache ou la calcule une seule fois.
    ///
    /// Si plusieurs appels concurrents ratent la même clé, un seul exécute
    /// `populate` ; les autres attendent puis lisent la valeur stockée. Une
    /// erreur de `populate` est rendue à l'appelant et rien n'est stocké.
    ///
    /// # Arguments
    ///
    /// * `region` - Région principale de l'entrée
    /// * `key` - Clé de l'entrée
    /// * `populate` - Calcul de la valeur en cas d'absence
    pub async fn get_or_populate<F, Fut, E>(
        &self,
        region: &Region,
        key: &CacheKey,
        populate: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Populated<V>, E>>,
    {
        if let Some(value) = self.lookup(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("[{}] hit {}", self.name, key);
            return Ok(value);
        }

        let lease = self.lease(key);
        let _permit = lease.lock.lock().await;

        // Un autre appel a pu peupler la clé pendant l'attente
        if let Some(value) = self.lookup(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("[{}] hit {} after wait", self.name, key);
            return Ok(value);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("[{}] miss {}, populating", self.name, key);

        let guard = self.begin_population();
        let started = guard.started;
        let populated = populate().await?;
        self.counters.populations.fetch_add(1, Ordering::Relaxed);

        let Populated {
            value,
            dependencies,
        } = populated;
        self.store(region, key, value.clone(), dependencies, started);
        Ok(value)
    }

    fn begin_population(&self) -> PopulationGuard<'_, V> {
        let mut inner = lock_or_recover(&self.inner);
        // Lue sous le verrou : une invalidation ne peut pas élaguer entre la
        // lecture et l'enregistrement
        let started = self.epoch.load(Ordering::SeqCst);
        *inner.running.entry(started).or_insert(0) += 1;
        PopulationGuard {
            cache: self,
            started,
        }
    }

    fn lease<'a>(&'a self, key: &'a CacheKey) -> KeyLease<'a, V> {
        let mut in_flight = lock_or_recover(&self.in_flight);
        let lock = in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        KeyLease {
            cache: self,
            key,
            lock,
        }
    }

    fn store(
        &self,
        region: &Region,
        key: &CacheKey,
        value: V,
        dependencies: Vec<Region>,
        started: u64,
    ) -> bool {
        let mut regions = Vec::with_capacity(dependencies.len() + 1);
        regions.push(region.clone());
        for dep in dependencies {
            if !regions.contains(&dep) {
                regions.push(dep);
            }
        }

        let mut inner = lock_or_recover(&self.inner);

        if inner.is_stale(&regions, started) {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "[{}] discarding {}: a region was invalidated during population",
                self.name,
                key
            );
            return false;
        }

        inner.remove_entry(key);
        for r in &regions {
            inner.regions.entry(r.clone()).or_default().insert(key.clone());
        }
        let now = Instant::now();
        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                regions,
                inserted_at: now,
                last_used: now,
                hits: 0,
            },
        );

        self.enforce_limit(&mut inner, key);
        true
    }

    /// Politique d'éviction LRU : les entrées les moins récemment utilisées
    /// (puis les moins consultées) partent en premier. L'entrée qui vient
    /// d'être insérée n'est jamais évincée.
    fn enforce_limit(&self, inner: &mut Inner<V>, just_inserted: &CacheKey) -> usize {
        let limit = self.settings.limit;
        if limit == 0 || inner.entries.len() <= limit {
            return 0;
        }

        let to_remove = inner.entries.len() - limit;
        let mut candidates: Vec<(Instant, u64, CacheKey)> = inner
            .entries
            .iter()
            .filter(|(k, _)| *k != just_inserted)
            .map(|(k, e)| (e.last_used, e.hits, k.clone()))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut removed = 0;
        for (_, _, key) in candidates.into_iter().take(to_remove) {
            if inner.remove_entry(&key).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            self.counters
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(
                "[{}] LRU eviction: removed {} entries (limit {})",
                self.name,
                removed,
                limit
            );
        }
        removed
    }

    /// Supprime toutes les entrées rattachées à `region`.
    ///
    /// Sûr en concurrence avec des populations en cours : celles qui ont
    /// démarré avant cet appel ne seront pas stockées.
    ///
    /// # Returns
    ///
    /// Le nombre d'entrées supprimées
    pub fn invalidate_region(&self, region: &Region) -> usize {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);

        let mut inner = lock_or_recover(&self.inner);
        inner.invalidated.insert(region.clone(), epoch);

        let keys: Vec<CacheKey> = inner
            .regions
            .get(region)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();

        let mut removed = 0;
        for key in &keys {
            if inner.remove_entry(key).is_some() {
                removed += 1;
            }
        }

        inner.prune_invalidations();

        tracing::debug!(
            "[{}] invalidated region {} ({} entries)",
            self.name,
            region,
            removed
        );
        removed
    }

    /// Supprime une seule entrée.
    pub fn remove(&self, key: &CacheKey) -> bool {
        lock_or_recover(&self.inner).remove_entry(key).is_some()
    }

    /// Vide entièrement le cache (arrêt du service).
    ///
    /// Les populations en cours au moment du vidage ne sont pas stockées.
    pub fn flush(&self) -> usize {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let mut inner = lock_or_recover(&self.inner);
        let count = inner.entries.len();
        inner.entries.clear();
        inner.regions.clear();
        inner.invalidated.clear();
        inner.flushed = epoch;
        tracing::info!("[{}] flushed {} entries", self.name, count);
        count
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        lock_or_recover(&self.inner).entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clés actuellement rattachées à `region`
    pub fn region_keys(&self, region: &Region) -> Vec<CacheKey> {
        lock_or_recover(&self.inner)
            .regions
            .get(region)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = lock_or_recover(&self.inner);
        CacheStats {
            entries: inner.entries.len(),
            regions: inner.regions.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            populations: self.counters.populations.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}
